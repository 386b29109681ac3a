use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::tool::{ToolCall, ToolDeclaration};
use crate::models::turn::Turn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }

    /// Add another call's counts. A count stays unknown only if both sides are unknown.
    pub fn accumulate(&mut self, other: &Usage) {
        fn sum(a: Option<i32>, b: Option<i32>) -> Option<i32> {
            match (a, b) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
            }
        }
        self.input_tokens = sum(self.input_tokens, other.input_tokens);
        self.output_tokens = sum(self.output_tokens, other.output_tokens);
        self.total_tokens = sum(self.total_tokens, other.total_tokens);
    }
}

/// Everything sent to the completion service for one call
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system: &'a str,
    /// Conversation so far, not including `message`
    pub history: &'a [Turn],
    pub tools: &'a [ToolDeclaration],
    /// The new user input, or the tool result being returned
    pub message: &'a Turn,
}

/// The service's answer: text, a single tool call, or (rarely) both
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelReply {
    pub text: Option<String>,
    pub tool_call: Option<ToolCall>,
    pub usage: Usage,
}

impl ModelReply {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            tool_call: Some(call),
            ..Default::default()
        }
    }

    /// The text, if any non-blank text came back
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Base trait for completion services (OpenAI, Gemini, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Label used when recording calls, e.g. "Gemini gemini-2.5-flash"
    fn label(&self) -> String;

    /// Generate the next reply for the conversation
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply>;
}
