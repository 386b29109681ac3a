//! The turn lifecycle.
//!
//! A turn takes accepted user input through at most one model call, one tool round trip
//! and a follow-up model call, then settles as `Completed` or `Failed`. Only one turn runs
//! at a time; the `busy` flag is claimed with compare-and-set and released by a guard on
//! every exit path, including a dropped future.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::diagnostics::{ApiRecord, CallStatus, DiagnosticsSink};
use crate::dispatcher::{AlertDispatch, LoggedAlertDispatch, SessionContext, ToolDispatcher};
use crate::effects::{EffectSender, EffectSlot, TurnOutcome};
use crate::errors::ShieldError;
use crate::hazard::{HazardData, StaticHazardData};
use crate::models::turn::Turn;
use crate::prompt_template::SystemInstruction;
use crate::providers::base::{ModelReply, ModelRequest, Provider, Usage};
use crate::transcript::TranscriptStore;
use crate::voice::Playback;

pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(30);

/// Reply when the model answers a plain turn with no text
pub const ACKNOWLEDGED_REPLY: &str = "I copy.";
/// Reply when the model has nothing to add after a tool ran
pub const EXECUTED_REPLY: &str = "Command executed.";
/// Reply recorded when the model service cannot be reached
pub const DEGRADED_REPLY: &str = "Connection to Shield Core interrupted.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    Dispatching,
    ToolPending,
    ToolExecuting,
    Resubmitting,
    Completed,
    Failed,
}

/// Why input was not accepted. Nothing is recorded for a rejected submission.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    #[error("A turn is already in progress")]
    Busy,
    #[error("Input is empty")]
    EmptyInput,
}

/// How an accepted turn ended
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    /// `Completed` or `Failed`
    pub state: TurnState,
    pub outcome: TurnOutcome,
    /// Tokens reported across the turn's model calls
    pub usage: Usage,
}

impl TurnReport {
    pub(crate) fn degraded() -> Self {
        Self {
            state: TurnState::Failed,
            outcome: TurnOutcome {
                text: DEGRADED_REPLY.to_string(),
                action: None,
            },
            usage: Usage::default(),
        }
    }
}

struct TurnFailure {
    stage: TurnState,
    error: ShieldError,
}

impl TurnFailure {
    fn at(stage: TurnState) -> impl FnOnce(ShieldError) -> Self {
        move |error| Self { stage, error }
    }
}

/// Drives turns against the model service and the tool dispatcher
pub struct TurnOrchestrator {
    provider: Box<dyn Provider>,
    dispatcher: ToolDispatcher,
    transcript: TranscriptStore,
    instruction: SystemInstruction,
    diagnostics: Arc<DiagnosticsSink>,
    effects: EffectSender,
    hazards: Arc<dyn HazardData>,
    alerts: Arc<dyn AlertDispatch>,
    playback: Option<Arc<Playback>>,
    model_timeout: Duration,
    busy: AtomicBool,
    state: Mutex<TurnState>,
}

impl TurnOrchestrator {
    pub fn new(provider: Box<dyn Provider>, dispatcher: ToolDispatcher, effects: EffectSender) -> Self {
        Self {
            provider,
            dispatcher,
            transcript: TranscriptStore::new(),
            instruction: SystemInstruction::new(),
            diagnostics: Arc::new(DiagnosticsSink::default()),
            effects,
            hazards: Arc::new(StaticHazardData::default()),
            alerts: Arc::new(LoggedAlertDispatch),
            playback: None,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            busy: AtomicBool::new(false),
            state: Mutex::new(TurnState::Idle),
        }
    }

    pub fn with_instruction(mut self, instruction: SystemInstruction) -> Self {
        self.instruction = instruction;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_hazards(mut self, hazards: Arc<dyn HazardData>) -> Self {
        self.hazards = hazards;
        self
    }

    pub fn with_alerts(mut self, alerts: Arc<dyn AlertDispatch>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_playback(mut self, playback: Arc<Playback>) -> Self {
        self.playback = Some(playback);
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticsSink> {
        &self.diagnostics
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub fn state(&self) -> TurnState {
        *self.state.lock()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: TurnState) {
        debug!(%state, "turn state");
        *self.state.lock() = state;
    }

    /// Run one turn for `input` with `region` as the active region.
    ///
    /// Blank input and input arriving while another turn is in flight are rejected without
    /// touching the transcript. An accepted turn always records the user turn and exactly one
    /// terminal model turn, even when the model service fails.
    pub async fn submit(&self, input: &str, region: &str) -> Result<TurnReport, Rejected> {
        let text = input.trim();
        if text.is_empty() {
            return Err(Rejected::EmptyInput);
        }
        let mut guard = TurnGuard::claim(self).ok_or_else(|| {
            warn!("turn already in progress, input rejected");
            Rejected::Busy
        })?;

        let history = self.transcript.snapshot();
        let user = Turn::user(text);
        self.transcript.append(user.clone());
        guard.user_recorded = true;

        let started = guard.started;
        let report = match self.run(&history, &user, region, started).await {
            Ok((outcome, usage)) => {
                self.transcript.append(Turn::model(outcome.text.clone()));
                self.set_state(TurnState::Completed);
                info!(
                    region,
                    action = ?outcome.action.as_ref().map(|a| a.kind()),
                    latency_ms = started.elapsed().as_millis() as u64,
                    input_tokens = ?usage.input_tokens,
                    output_tokens = ?usage.output_tokens,
                    "turn completed"
                );
                self.effects.publish(outcome.clone());
                if let Some(playback) = &self.playback {
                    playback.speak(&outcome.text);
                }
                TurnReport {
                    state: TurnState::Completed,
                    outcome,
                    usage,
                }
            }
            Err(failure) => {
                error!(stage = %failure.stage, error = %failure.error, "turn failed");
                self.diagnostics.record(ApiRecord::new(
                    self.provider.label(),
                    CallStatus::Failure,
                    started.elapsed(),
                    format!("Agent Error during {}: {}", failure.stage, failure.error),
                ));
                self.transcript.append(Turn::model(DEGRADED_REPLY));
                self.set_state(TurnState::Failed);
                TurnReport::degraded()
            }
        };
        guard.settled = true;
        Ok(report)
    }

    async fn run(
        &self,
        history: &[Turn],
        user: &Turn,
        region: &str,
        started: Instant,
    ) -> Result<(TurnOutcome, Usage), TurnFailure> {
        self.set_state(TurnState::Dispatching);
        let system = self
            .instruction
            .render(region)
            .map_err(|e| ShieldError::Internal(format!("system instruction: {}", e)))
            .map_err(TurnFailure::at(TurnState::Dispatching))?;
        let tools = self.dispatcher.registry().declarations();

        let reply = self
            .call_model(ModelRequest {
                system: &system,
                history,
                tools,
                message: user,
            })
            .await
            .map_err(TurnFailure::at(TurnState::Dispatching))?;

        let Some(call) = reply.tool_call else {
            self.diagnostics.record(ApiRecord::new(
                format!("{} Chat", self.provider.label()),
                CallStatus::Success,
                started.elapsed(),
                "processed message",
            ));
            let text = non_empty_or(reply.text, ACKNOWLEDGED_REPLY);
            return Ok((TurnOutcome { text, action: None }, reply.usage));
        };

        self.set_state(TurnState::ToolPending);
        debug!(tool = %call.name, "model requested a tool");

        self.set_state(TurnState::ToolExecuting);
        let context = SessionContext {
            active_region: region,
            hazards: self.hazards.as_ref(),
            alerts: self.alerts.as_ref(),
        };
        let dispatch = self.dispatcher.execute(&call, &context);
        let mut slot = EffectSlot::new();
        if let Some(action) = dispatch.action {
            slot.offer(action);
        }
        self.diagnostics.record(ApiRecord::new(
            format!("{} Tool", self.provider.label()),
            if dispatch.result.ok {
                CallStatus::Success
            } else {
                CallStatus::Failure
            },
            started.elapsed(),
            format!("Tool Executed: {} ({})", call.name, dispatch.result.summary()),
        ));

        let tool_turn = Turn::tool_result(call, dispatch.result);
        let mut continued = history.to_vec();
        continued.push(user.clone());
        self.transcript.append(tool_turn.clone());

        self.set_state(TurnState::Resubmitting);
        let follow_up = self
            .call_model(ModelRequest {
                system: &system,
                history: &continued,
                tools,
                message: &tool_turn,
            })
            .await
            .map_err(TurnFailure::at(TurnState::Resubmitting))?;

        if let Some(extra) = &follow_up.tool_call {
            warn!(tool = %extra.name, "second tool request in one turn, treating reply as final");
        }
        let mut usage = reply.usage;
        usage.accumulate(&follow_up.usage);
        Ok((
            TurnOutcome {
                text: non_empty_or(follow_up.text, EXECUTED_REPLY),
                action: slot.take(),
            },
            usage,
        ))
    }

    async fn call_model(&self, request: ModelRequest<'_>) -> Result<ModelReply, ShieldError> {
        match tokio::time::timeout(self.model_timeout, self.provider.complete(request)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(ShieldError::Transport(format!("{:#}", e))),
            Err(_) => Err(ShieldError::Transport(format!(
                "no reply within {}s",
                self.model_timeout.as_secs_f32()
            ))),
        }
    }
}

fn non_empty_or(text: Option<String>, fallback: &str) -> String {
    match text {
        Some(text) if !text.trim().is_empty() => text,
        _ => fallback.to_string(),
    }
}

/// Holds `busy` for the length of a turn
struct TurnGuard<'a> {
    orchestrator: &'a TurnOrchestrator,
    started: Instant,
    user_recorded: bool,
    settled: bool,
}

impl<'a> TurnGuard<'a> {
    fn claim(orchestrator: &'a TurnOrchestrator) -> Option<Self> {
        orchestrator
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        Some(Self {
            orchestrator,
            started: Instant::now(),
            user_recorded: false,
            settled: false,
        })
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if self.user_recorded && !self.settled {
            let stage = self.orchestrator.state();
            warn!(%stage, "turn abandoned before it settled");
            self.orchestrator.diagnostics.record(ApiRecord::new(
                self.orchestrator.provider.label(),
                CallStatus::Failure,
                self.started.elapsed(),
                format!("Agent Error during {}: turn abandoned", stage),
            ));
            self.orchestrator
                .transcript
                .append(Turn::model(DEGRADED_REPLY));
        }
        self.orchestrator.set_state(TurnState::Idle);
        self.orchestrator.busy.store(false, Ordering::SeqCst);
    }
}
