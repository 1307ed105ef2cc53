// Upstream LLM client module
//
// Speaks the serving endpoint's chat-completions shape: a messages list
// out, a choices list back. The endpoint and the name of the env var
// holding its API key come from configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::error::LoadTestError;

/// Upstream requests get a generous fixed bound; LLM generation is slow
/// compared to the harness's own per-request timeout.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct LlmMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct LlmPayload<'a> {
    messages: Vec<LlmMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct LlmChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct LlmChoice {
    message: LlmChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct LlmResponse {
    choices: Vec<LlmChoice>,
}

pub struct LlmClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl LlmClient {
    /// Build the client from configuration. A missing endpoint is not
    /// fatal at startup; chat requests will fail with an upstream error
    /// until one is configured.
    pub fn from_config(config: &Config) -> Result<Self, LoadTestError> {
        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(|e| LoadTestError::ConfigError(format!("failed to build LLM client: {}", e)))?;
        let api_key = std::env::var(&config.llm_api_key_env).ok();
        if config.llm_endpoint.is_empty() {
            tracing::warn!("no LLM endpoint configured; /api/chat will return upstream errors");
        }
        Ok(Self {
            client,
            endpoint: config.llm_endpoint.clone(),
            api_key,
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty()
    }

    /// Send one user message and return the assistant content.
    pub async fn complete(&self, message: &str) -> Result<String, LoadTestError> {
        if self.endpoint.is_empty() {
            return Err(LoadTestError::UpstreamError(
                "no LLM endpoint configured".to_string(),
            ));
        }

        let payload = LlmPayload {
            messages: vec![LlmMessage {
                role: "user",
                content: message,
            }],
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadTestError::UpstreamError(format!(
                "status {}",
                status.as_u16()
            )));
        }

        let body: LlmResponse = response
            .json()
            .await
            .map_err(|e| LoadTestError::UpstreamError(format!("invalid response: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if content.is_empty() {
            return Err(LoadTestError::UpstreamError(
                "empty response content".to_string(),
            ));
        }
        Ok(content)
    }
}
