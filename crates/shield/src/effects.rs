//! Application-mutating effects travel out of the orchestrator as data.
//!
//! A completed turn produces a [`TurnOutcome`]: the final text plus at most one
//! [`SideEffectAction`]. The orchestrator publishes outcomes on an [`EffectSender`]; the host
//! owns the only [`EffectReceiver`] and applies each action exactly once.
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tokio::sync::mpsc;
use tracing::warn;

/// What kind of mutation an action asks the host for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectKind {
    Navigate,
    Alert,
}

/// An emergency broadcast drafted by the alert tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotice {
    pub languages: Vec<String>,
    pub districts: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SideEffectAction {
    /// Switch the active map region to the given id
    Navigate(String),
    Alert(AlertNotice),
}

impl SideEffectAction {
    pub fn kind(&self) -> EffectKind {
        match self {
            SideEffectAction::Navigate(_) => EffectKind::Navigate,
            SideEffectAction::Alert(_) => EffectKind::Alert,
        }
    }
}

/// The result of a completed turn as seen by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub text: String,
    pub action: Option<SideEffectAction>,
}

/// Holds the single action a turn may emit. The first offer wins.
#[derive(Debug, Default)]
pub struct EffectSlot {
    action: Option<SideEffectAction>,
}

impl EffectSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an action for this turn. Returns false if one was already taken.
    pub fn offer(&mut self, action: SideEffectAction) -> bool {
        if let Some(existing) = &self.action {
            warn!(
                kept = %existing.kind(),
                dropped = %action.kind(),
                "turn already carries a side effect, ignoring the later one"
            );
            return false;
        }
        self.action = Some(action);
        true
    }

    pub fn take(&mut self) -> Option<SideEffectAction> {
        self.action.take()
    }
}

#[derive(Debug, Clone)]
pub struct EffectSender {
    tx: mpsc::UnboundedSender<TurnOutcome>,
}

#[derive(Debug)]
pub struct EffectReceiver {
    rx: mpsc::UnboundedReceiver<TurnOutcome>,
}

/// Create the channel completed turns are published on
pub fn channel() -> (EffectSender, EffectReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EffectSender { tx }, EffectReceiver { rx })
}

impl EffectSender {
    /// Publish an outcome. A host that stopped listening is not an error for the turn.
    pub fn publish(&self, outcome: TurnOutcome) {
        if self.tx.send(outcome).is_err() {
            warn!("side effect receiver dropped, outcome not delivered");
        }
    }
}

impl EffectReceiver {
    /// Wait for the next completed turn
    pub async fn recv(&mut self) -> Option<TurnOutcome> {
        self.rx.recv().await
    }

    /// The next completed turn, if one is already waiting
    pub fn try_recv(&mut self) -> Option<TurnOutcome> {
        self.rx.try_recv().ok()
    }
}

impl Stream for EffectReceiver {
    type Item = TurnOutcome;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
