use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::iter;
use std::time::Duration;

use super::base::{ModelReply, ModelRequest, Provider};
use super::configs::GeminiProviderConfig;
use super::utils::{gemini_response_to_reply, tools_to_gemini_spec, turns_to_gemini_contents};

pub struct GeminiProvider {
    client: Client,
    config: GeminiProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.host.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
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

    fn generation_config(&self) -> Option<Value> {
        let mut config = Map::new();
        if let Some(temp) = self.config.temperature {
            config.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            config.insert("maxOutputTokens".to_string(), json!(tokens));
        }
        (!config.is_empty()).then_some(Value::Object(config))
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn label(&self) -> String {
        format!("Gemini {}", self.config.model)
    }

    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        let turns: Vec<_> = request
            .history
            .iter()
            .chain(iter::once(request.message))
            .cloned()
            .collect();

        let mut payload = json!({
            "contents": turns_to_gemini_contents(&turns),
        });
        if !request.system.is_empty() {
            payload["systemInstruction"] = json!({"parts": [{"text": request.system}]});
        }
        if !request.tools.is_empty() {
            payload["tools"] = json!(tools_to_gemini_spec(request.tools)?);
        }
        if let Some(config) = self.generation_config() {
            payload["generationConfig"] = config;
        }

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            return Err(anyhow!("Gemini API error: {}", error));
        }

        gemini_response_to_reply(&response)
    }
}
