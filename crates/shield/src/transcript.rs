use parking_lot::RwLock;

use crate::models::role::Role;
use crate::models::turn::Turn;

/// Ordered, append-only conversation log
///
/// Entries are never rewritten or removed once appended. The orchestrator is the only writer;
/// everyone else reads snapshots.
#[derive(Debug, Default)]
pub struct TranscriptStore {
    turns: RwLock<Vec<Turn>>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, returning its position in the transcript
    pub fn append(&self, turn: Turn) -> usize {
        let mut turns = self.turns.write();
        turns.push(turn);
        turns.len() - 1
    }

    /// The full ordered sequence of turns
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.read().clone()
    }

    pub fn last(&self) -> Option<Turn> {
        self.turns.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.turns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.read().is_empty()
    }
}

/// Whether a sequence of turns follows the conversation shape: each user turn is followed by
/// at most one tool-result turn and then exactly one model turn.
pub fn is_well_formed(turns: &[Turn]) -> bool {
    let mut expected = Role::User;
    for turn in turns {
        expected = match (expected, turn.role) {
            (Role::User, Role::User) => Role::ToolResult,
            (Role::ToolResult, Role::ToolResult) => Role::Model,
            (Role::ToolResult, Role::Model) | (Role::Model, Role::Model) => Role::User,
            _ => return false,
        };
    }
    expected == Role::User
}
