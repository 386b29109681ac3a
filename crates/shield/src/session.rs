//! Process-wide agent state and the handle hosts drive it through.
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::diagnostics::DiagnosticsSink;
use crate::dispatcher::{AlertDispatch, ToolDispatcher};
use crate::effects::{self, EffectReceiver, SideEffectAction};
use crate::errors::{ShieldError, ShieldResult};
use crate::hazard::{find_basin, HazardData};
use crate::models::turn::Turn;
use crate::orchestrator::{Rejected, TurnOrchestrator, TurnReport, TurnState};
use crate::prompt_template::SystemInstruction;
use crate::providers::base::Provider;
use crate::voice::{Capture, Playback, SpeechRecognizer, SpeechSynthesizer};

pub const DEFAULT_REGION: &str = "ni";

/// Opening line hosts show before the first turn. It is not part of the transcript.
pub const GREETING: &str = "Shield Protocol Active. Awaiting orders.";

/// Canned prompts hosts may offer as shortcuts
pub const SUGGESTIONS: [&str; 4] = [
    "Status of Cyclone Ditwah?",
    "Show Florida risks",
    "Deep dive Tampa",
    "Find nearest shelters",
];

pub struct Session {
    orchestrator: TurnOrchestrator,
    region: RwLock<String>,
    capture: Capture,
    playback: Arc<Playback>,
}

/// Cheap, cloneable access to the session
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Session>,
}

pub struct SessionBuilder {
    provider: Box<dyn Provider>,
    region: String,
    model_timeout: Option<Duration>,
    instruction: SystemInstruction,
    diagnostics: Option<Arc<DiagnosticsSink>>,
    hazards: Option<Arc<dyn HazardData>>,
    alerts: Option<Arc<dyn AlertDispatch>>,
    dispatcher: Option<ToolDispatcher>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    muted: bool,
}

impl Session {
    pub fn builder(provider: Box<dyn Provider>) -> SessionBuilder {
        SessionBuilder {
            provider,
            region: DEFAULT_REGION.to_string(),
            model_timeout: None,
            instruction: SystemInstruction::new(),
            diagnostics: None,
            hazards: None,
            alerts: None,
            dispatcher: None,
            recognizer: None,
            synthesizer: None,
            muted: false,
        }
    }
}

impl SessionBuilder {
    pub fn region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = region.into();
        self
    }

    pub fn model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = Some(timeout);
        self
    }

    pub fn instruction(mut self, instruction: SystemInstruction) -> Self {
        self.instruction = instruction;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<DiagnosticsSink>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn hazards(mut self, hazards: Arc<dyn HazardData>) -> Self {
        self.hazards = Some(hazards);
        self
    }

    pub fn alerts(mut self, alerts: Arc<dyn AlertDispatch>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Replace the built-in tools
    pub fn dispatcher(mut self, dispatcher: ToolDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    /// Build the session. The receiver is where completed turns and their actions arrive.
    ///
    /// Fails if the starting region is not a known basin.
    pub fn build(self) -> ShieldResult<(SessionHandle, EffectReceiver)> {
        let basin = find_basin(&self.region).ok_or_else(|| {
            ShieldError::InvalidParameters(format!("unknown basin '{}'", self.region))
        })?;
        let (sender, receiver) = effects::channel();
        let dispatcher = match self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => ToolDispatcher::with_default_tools()?,
        };

        let playback = Arc::new(match self.synthesizer {
            Some(synthesizer) => Playback::new(synthesizer),
            None => Playback::unavailable(),
        });
        playback.set_muted(self.muted);
        let capture = match self.recognizer {
            Some(recognizer) => Capture::new(recognizer),
            None => Capture::unavailable(),
        };

        let mut orchestrator = TurnOrchestrator::new(self.provider, dispatcher, sender)
            .with_instruction(self.instruction)
            .with_playback(Arc::clone(&playback));
        if let Some(timeout) = self.model_timeout {
            orchestrator = orchestrator.with_model_timeout(timeout);
        }
        if let Some(diagnostics) = self.diagnostics {
            orchestrator = orchestrator.with_diagnostics(diagnostics);
        }
        if let Some(hazards) = self.hazards {
            orchestrator = orchestrator.with_hazards(hazards);
        }
        if let Some(alerts) = self.alerts {
            orchestrator = orchestrator.with_alerts(alerts);
        }

        let session = Session {
            orchestrator,
            region: RwLock::new(basin.id.to_string()),
            capture,
            playback,
        };
        Ok((
            SessionHandle {
                inner: Arc::new(session),
            },
            receiver,
        ))
    }
}

impl SessionHandle {
    /// Submit typed input for the active region
    ///
    /// The turn runs on its own task, so a caller that stops waiting does not cancel a
    /// round trip that has already started.
    pub async fn submit(&self, input: &str) -> Result<TurnReport, Rejected> {
        let region = self.active_region();
        let session = Arc::clone(&self.inner);
        let input = input.to_string();
        let turn = tokio::spawn(async move { session.orchestrator.submit(&input, &region).await });
        match turn.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                warn!(error = %e, "turn task cancelled");
                Ok(TurnReport::degraded())
            }
        }
    }

    pub fn active_region(&self) -> String {
        self.inner.region.read().clone()
    }

    /// Switch the active region. Unknown basins are refused.
    pub fn set_active_region(&self, region_id: &str) -> bool {
        let Some(basin) = find_basin(region_id) else {
            warn!(region = region_id, "unknown basin, keeping the current region");
            return false;
        };
        *self.inner.region.write() = basin.id.to_string();
        info!(region = basin.id, "active region changed");
        true
    }

    /// Apply the part of an action the session owns. Returns true if session state changed.
    ///
    /// Navigation moves the active region; alerts are for the host to display.
    pub fn apply(&self, action: &SideEffectAction) -> bool {
        match action {
            SideEffectAction::Navigate(region_id) => self.set_active_region(region_id),
            SideEffectAction::Alert(_) => false,
        }
    }

    /// Start voice capture; the recognized phrase is submitted like typed input
    pub fn start_listening(&self) -> bool {
        let session = self.clone();
        self.inner.capture.start(move |text| async move {
            if let Err(rejected) = session.submit(&text).await {
                warn!(%rejected, "voice input dropped");
            }
        })
    }

    pub fn stop_listening(&self) {
        self.inner.capture.stop();
    }

    pub fn is_listening(&self) -> bool {
        self.inner.capture.is_capturing()
    }

    pub fn voice_input_available(&self) -> bool {
        self.inner.capture.is_available()
    }

    pub fn set_muted(&self, muted: bool) {
        self.inner.playback.set_muted(muted);
    }

    pub fn is_muted(&self) -> bool {
        self.inner.playback.is_muted()
    }

    pub fn is_speaking(&self) -> bool {
        self.inner.playback.is_speaking()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.orchestrator.is_busy()
    }

    pub fn state(&self) -> TurnState {
        self.inner.orchestrator.state()
    }

    pub fn transcript(&self) -> Vec<Turn> {
        self.inner.orchestrator.transcript().snapshot()
    }

    pub fn diagnostics(&self) -> Arc<DiagnosticsSink> {
        Arc::clone(self.inner.orchestrator.diagnostics())
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        self.inner.orchestrator.dispatcher()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::ToolCall;
    use crate::providers::base::ModelReply;
    use crate::providers::mock::MockProvider;
    use serde_json::json;

    fn session(mock: &MockProvider) -> (SessionHandle, EffectReceiver) {
        Session::builder(Box::new(mock.clone())).build().unwrap()
    }

    #[tokio::test]
    async fn test_navigate_then_apply() {
        let mock = MockProvider::new(vec![
            ModelReply::tool_call(ToolCall::new("navigate_to_basin", json!({"basin_id": "na"}))),
            ModelReply::text("North Atlantic on screen."),
        ]);
        let (session, mut rx) = session(&mock);
        assert_eq!(session.active_region(), "ni");

        session.submit("Switch to Atlantic Basin").await.unwrap();
        // the orchestrator does not navigate by itself
        assert_eq!(session.active_region(), "ni");

        let outcome = rx.try_recv().unwrap();
        let action = outcome.action.unwrap();
        assert!(session.apply(&action));
        assert_eq!(session.active_region(), "na");
    }

    #[tokio::test]
    async fn test_system_instruction_follows_region() {
        let mock = MockProvider::new(vec![ModelReply::text("a"), ModelReply::text("b")]);
        let (session, _rx) = session(&mock);

        session.submit("first").await.unwrap();
        session.set_active_region("WP");
        session.submit("second").await.unwrap();

        let requests = mock.requests();
        assert!(requests[0].system.contains("id \"ni\""));
        assert!(requests[1].system.contains("id \"wp\""));
        assert_eq!(requests[1].history.len(), 2);
    }

    #[test]
    fn test_unknown_region_refused() {
        let mock = MockProvider::default();
        let (session, _rx) = session(&mock);

        assert!(!session.set_active_region("atlantis"));
        assert_eq!(session.active_region(), "ni");
    }

    #[test]
    fn test_suggestions() {
        assert_eq!(
            SUGGESTIONS,
            [
                "Status of Cyclone Ditwah?",
                "Show Florida risks",
                "Deep dive Tampa",
                "Find nearest shelters",
            ]
        );
    }

    #[test]
    fn test_build_checks_starting_region() {
        let mock = MockProvider::default();

        match Session::builder(Box::new(mock.clone())).region("atlantis").build() {
            Err(ShieldError::InvalidParameters(message)) => assert!(message.contains("atlantis")),
            Err(e) => panic!("Expected InvalidParameters, got {:?}", e),
            Ok(_) => panic!("Expected an unknown basin to be refused"),
        }

        let (session, _rx) = Session::builder(Box::new(mock)).region("NA").build().unwrap();
        assert_eq!(session.active_region(), "na");
    }

    #[test]
    fn test_voice_unavailable_by_default() {
        let mock = MockProvider::default();
        let (session, _rx) = session(&mock);

        assert!(!session.voice_input_available());
        assert!(!session.start_listening());
        session.set_muted(true);
        assert!(session.is_muted());
    }
}
