//! Anthropic Messages API client (spec.md §4.3).
//!
//! Diverges from the OpenAI chat shape enough to warrant its own module:
//! the system prompt is a top-level field rather than a `system` role
//! message, `max_tokens` is mandatory, auth uses `x-api-key` plus an
//! `anthropic-version` header, and the reply's content is an array of
//! typed blocks rather than a single string.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::llm::client::ILlmClient;
use crate::llm::types::{detect_provider_error, LlmProvider, LlmRequest, LlmResponse};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self { base_url: base_url.into(), api_key, client: reqwest::Client::new() }
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    system: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[async_trait]
impl ILlmClient for AnthropicClient {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Anthropic
    }

    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let started = Instant::now();
        let Some(api_key) = &self.api_key else {
            return Ok(LlmResponse::failure(
                LlmProvider::Anthropic,
                &request.model,
                "no API key configured",
                started.elapsed().as_millis() as u64,
            ));
        };

        let body = MessagesRequest {
            model: request.model.clone(),
            system: request.system_prompt.clone(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
            messages: vec![AnthropicMessage { role: "user", content: request.user_prompt.clone() }],
        };

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                return Ok(LlmResponse::failure(
                    LlmProvider::Anthropic,
                    &request.model,
                    error.to_string(),
                    started.elapsed().as_millis() as u64,
                ))
            }
        };

        let status = response.status();
        let elapsed = started.elapsed().as_millis() as u64;
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(LlmResponse::failure(
                LlmProvider::Anthropic,
                &request.model,
                format!("http {status}: {body}"),
                elapsed,
            ));
        }

        let raw_body = match response.text().await {
            Ok(text) => text,
            Err(error) => return Ok(LlmResponse::failure(LlmProvider::Anthropic, &request.model, error.to_string(), elapsed)),
        };

        if let Some(rate_limit_message) = detect_provider_error(&raw_body) {
            return Ok(LlmResponse::failure(LlmProvider::Anthropic, &request.model, rate_limit_message, elapsed));
        }

        let parsed: MessagesResponse = match serde_json::from_str(&raw_body) {
            Ok(parsed) => parsed,
            Err(error) => return Ok(LlmResponse::failure(LlmProvider::Anthropic, &request.model, error.to_string(), elapsed)),
        };

        let content = parsed.content.into_iter().map(|block| block.text).collect::<Vec<_>>().join("");
        let usage = parsed.usage.unwrap_or_default();
        Ok(LlmResponse::success(LlmProvider::Anthropic, &request.model, content, usage.input_tokens, usage.output_tokens, elapsed))
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_api_key_fails_without_network_call() {
        let client = AnthropicClient::new("https://api.anthropic.com", None);
        let request = LlmRequest::new("sys", "user", "claude-sonnet");
        let response = client.send(&request).await.unwrap();
        assert!(!response.success);
    }
}
