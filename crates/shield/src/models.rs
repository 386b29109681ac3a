//! These models represent the objects passed around by the agent
//!
//! Turns are what the transcript stores and what gets replayed to the completion service.
//! Tool declarations, calls and results are the typed exchange between the service and the
//! dispatcher. Provider modules convert to and from their wire formats at the edge, so
//! nothing untyped travels further than the provider that received it.
pub mod role;
pub mod tool;
pub mod turn;
