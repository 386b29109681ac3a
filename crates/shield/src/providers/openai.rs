use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::iter;
use std::time::Duration;

use super::base::{ModelReply, ModelRequest, Provider};
use super::configs::OpenAiProviderConfig;
use super::utils::{openai_response_to_reply, tools_to_openai_spec, turns_to_openai_spec};

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => Err(anyhow!("Request failed: {}", status)),
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn label(&self) -> String {
        format!("OpenAI {}", self.config.model)
    }

    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        let turns: Vec<_> = request
            .history
            .iter()
            .chain(iter::once(request.message))
            .cloned()
            .collect();
        let tools_spec = tools_to_openai_spec(request.tools)?;

        let mut messages_array = Vec::new();
        if !request.system.is_empty() {
            messages_array.push(json!({
                "role": "system",
                "content": request.system
            }));
        }
        messages_array.extend(turns_to_openai_spec(&turns));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array
        });

        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        openai_response_to_reply(&response)
    }
}
