//! Shield mediates between operator input, a remote completion service that can request
//! tool invocations, and the host dashboard's navigation and alerting state.
pub mod briefing;
pub mod diagnostics;
pub mod dispatcher;
pub mod effects;
pub mod errors;
pub mod hazard;
pub mod models;
pub mod orchestrator;
pub mod prompt_template;
pub mod providers;
pub mod registry;
pub mod session;
pub mod toolbox;
pub mod transcript;
pub mod voice;

pub use errors::{ShieldError, ShieldResult};
pub use session::{Session, SessionHandle};
