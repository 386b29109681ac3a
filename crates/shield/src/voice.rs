//! Speech in and out of the agent.
//!
//! Both directions are optional capabilities. [`Capture`] runs at most one recognition at a
//! time and hands the transcript to the same path as typed input. [`Playback`] keeps at most one
//! utterance audible and honours the mute switch. Neither blocks a turn.
pub mod capture;
pub mod playback;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ShieldResult;

pub use capture::Capture;
pub use playback::Playback;

pub const DEFAULT_LANGUAGE: &str = "en-US";
pub const DEFAULT_RATE: f32 = 1.1;
pub const DEFAULT_PITCH: f32 = 1.0;

/// A single piece of text to be spoken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
}

impl Utterance {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            lang: DEFAULT_LANGUAGE.to_string(),
            rate: DEFAULT_RATE,
            pitch: DEFAULT_PITCH,
        }
    }
}

/// Turns speech into text. One call captures one phrase.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn listen(&self, lang: &str) -> ShieldResult<String>;
}

/// Speaks an utterance, resolving when it has finished
///
/// Playback is cancelled by dropping the future, so implementations must stop
/// audio output when dropped.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(&self, utterance: &Utterance) -> ShieldResult<()>;
}
