use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{SpeechRecognizer, DEFAULT_LANGUAGE};

#[derive(Default)]
struct CaptureState {
    generation: u64,
    active: Option<JoinHandle<()>>,
}

/// Single-flight speech capture
pub struct Capture {
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    state: Arc<Mutex<CaptureState>>,
}

impl Capture {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer: Some(recognizer),
            state: Arc::default(),
        }
    }

    /// Capture for an environment without speech input
    pub fn unavailable() -> Self {
        Self {
            recognizer: None,
            state: Arc::default(),
        }
    }

    /// Whether the host should offer voice input at all
    pub fn is_available(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Begin listening. When a phrase is recognized, `on_transcript` runs with it on its own
    /// task, so stopping a later capture never interrupts the turn it started.
    ///
    /// Returns false and does nothing if already capturing or no recognizer is present.
    pub fn start<F, Fut>(&self, on_transcript: F) -> bool
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(recognizer) = self.recognizer.clone() else {
            debug!("speech capture unavailable");
            return false;
        };

        let mut state = self.state.lock();
        if state.active.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }
        state.generation += 1;
        let generation = state.generation;
        let shared = Arc::clone(&self.state);

        state.active = Some(tokio::spawn(async move {
            let heard = recognizer.listen(DEFAULT_LANGUAGE).await;
            {
                let mut state = shared.lock();
                if state.generation == generation {
                    state.active = None;
                }
            }
            match heard {
                Ok(text) if !text.trim().is_empty() => {
                    tokio::spawn(on_transcript(text));
                }
                Ok(_) => debug!("speech capture produced no text"),
                Err(e) => debug!(error = %e, "speech capture failed"),
            }
        }));
        true
    }

    /// Cancel an in-progress capture. No transcript is produced.
    pub fn stop(&self) {
        if let Some(handle) = self.state.lock().active.take() {
            handle.abort();
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.state
            .lock()
            .active
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}
