use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::models::turn::Turn;
use crate::providers::base::{ModelReply, ModelRequest, Provider};

/// One scripted step of a [`MockProvider`]
#[derive(Debug, Clone)]
pub enum MockStep {
    Reply(ModelReply),
    Fail(String),
    /// Wait before replying, to exercise timeouts and overlapping submissions
    Delayed(Duration, ModelReply),
}

/// What the mock was asked, kept for assertions
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system: String,
    pub history: Vec<Turn>,
    pub tools: Vec<String>,
    pub message: Turn,
}

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone, Default)]
pub struct MockProvider {
    steps: Arc<Mutex<VecDeque<MockStep>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of replies
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self::scripted(replies.into_iter().map(MockStep::Reply).collect())
    }

    pub fn scripted(steps: Vec<MockStep>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into())),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn label(&self) -> String {
        "Mock".to_string()
    }

    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        self.requests.lock().push(RecordedRequest {
            system: request.system.to_string(),
            history: request.history.to_vec(),
            tools: request.tools.iter().map(|t| t.name.clone()).collect(),
            message: request.message.clone(),
        });

        let step = self.steps.lock().pop_front();
        match step {
            // Return empty response if no more pre-configured responses
            None => Ok(ModelReply::text("")),
            Some(MockStep::Reply(reply)) => Ok(reply),
            Some(MockStep::Fail(message)) => Err(anyhow!(message)),
            Some(MockStep::Delayed(delay, reply)) => {
                tokio::time::sleep(delay).await;
                Ok(reply)
            }
        }
    }
}
