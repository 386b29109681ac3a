use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;
use super::tool::{ToolCall, ToolResult};

/// A tool call the model made together with the result that answered it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExchange {
    pub call: ToolCall,
    pub result: ToolResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Content of a single transcript entry
pub enum TurnContent {
    Text { text: String },
    ToolExchange(ToolExchange),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One step of the conversation
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub created: i64,
    pub content: TurnContent,
}

impl Turn {
    fn new(role: Role, content: TurnContent) -> Self {
        Turn {
            id: Uuid::new_v4().to_string(),
            role,
            created: Utc::now().timestamp(),
            content,
        }
    }

    /// Create a user turn with the current timestamp
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(Role::User, TurnContent::Text { text: text.into() })
    }

    /// Create a model turn with the current timestamp
    pub fn model<S: Into<String>>(text: S) -> Self {
        Self::new(Role::Model, TurnContent::Text { text: text.into() })
    }

    /// Create the synthetic entry recording a tool round trip
    pub fn tool_result(call: ToolCall, result: ToolResult) -> Self {
        Self::new(
            Role::ToolResult,
            TurnContent::ToolExchange(ToolExchange { call, result }),
        )
    }

    /// Get the text if this is a text turn
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_exchange(&self) -> Option<&ToolExchange> {
        match &self.content {
            TurnContent::ToolExchange(exchange) => Some(exchange),
            _ => None,
        }
    }
}
