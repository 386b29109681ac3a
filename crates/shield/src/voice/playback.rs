use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{SpeechSynthesizer, Utterance};

#[derive(Default)]
struct PlaybackState {
    muted: bool,
    current: Option<JoinHandle<()>>,
}

impl PlaybackState {
    fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.abort();
        }
    }
}

/// Single-utterance speech output with a mute switch
pub struct Playback {
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    state: Mutex<PlaybackState>,
}

impl Playback {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            synthesizer: Some(synthesizer),
            state: Mutex::default(),
        }
    }

    /// Playback for an environment without speech output. Every `speak` is a no-op.
    pub fn unavailable() -> Self {
        Self {
            synthesizer: None,
            state: Mutex::default(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// Start speaking `text`, cutting off whatever is playing. Returns without waiting.
    ///
    /// Returns false when nothing was started: muted, blank text, or no synthesizer.
    pub fn speak(&self, text: &str) -> bool {
        let mut state = self.state.lock();
        if state.muted {
            debug!("muted, skipping utterance");
            return false;
        }
        state.cancel();

        let Some(synthesizer) = self.synthesizer.clone() else {
            debug!("speech output unavailable");
            return false;
        };
        if text.trim().is_empty() {
            return false;
        }

        let utterance = Utterance::new(text);
        state.current = Some(tokio::spawn(async move {
            if let Err(e) = synthesizer.speak(&utterance).await {
                debug!(error = %e, "speech output failed");
            }
        }));
        true
    }

    /// Stop the current utterance, if any
    pub fn cancel(&self) {
        self.state.lock().cancel();
    }

    /// Muting stops playback now and suppresses later utterances. Unmuting replays nothing.
    pub fn set_muted(&self, muted: bool) {
        let mut state = self.state.lock();
        state.muted = muted;
        if muted {
            state.cancel();
        }
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    pub fn is_speaking(&self) -> bool {
        self.state
            .lock()
            .current
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
