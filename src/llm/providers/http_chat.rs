//! Generalized OpenAI-compatible chat-completion client (spec.md §4.3).
//!
//! OpenAI, Azure OpenAI, Groq, OpenRouter, DeepSeek, and QwenCode all
//! expose the same `POST {base}/chat/completions` shape with a
//! `messages: [{role, content}]` body and a `choices[0].message.content`
//! reply. One parameterized client covers all six rather than six
//! near-identical structs, grounded on the `reqwest::Client` +
//! serde-DTO + `response.json()` idiom also used by `gemini`'s client,
//! generalized from Gemini's bespoke schema to the much more common
//! OpenAI one.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::llm::client::ILlmClient;
use crate::llm::types::{detect_provider_error, LlmProvider, LlmRequest, LlmResponse};

/// How the provider expects its API key presented.
#[derive(Debug, Clone, Copy)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// `api-key: <key>` (Azure OpenAI).
    ApiKeyHeader,
}

#[derive(Debug, Clone)]
pub struct HttpChatProvider {
    provider: LlmProvider,
    base_url: String,
    api_key: Option<String>,
    auth_style: AuthStyle,
    client: reqwest::Client,
}

impl HttpChatProvider {
    pub fn new(provider: LlmProvider, base_url: impl Into<String>, api_key: Option<String>, auth_style: AuthStyle) -> Self {
        Self {
            provider,
            base_url: base_url.into(),
            api_key,
            auth_style,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl ILlmClient for HttpChatProvider {
    fn provider(&self) -> LlmProvider {
        self.provider
    }

    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let started = Instant::now();
        let Some(api_key) = &self.api_key else {
            return Ok(LlmResponse::failure(
                self.provider,
                &request.model,
                "no API key configured",
                started.elapsed().as_millis() as u64,
            ));
        };

        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: vec![
                ChatMessage { role: "system", content: request.system_prompt.clone() },
                ChatMessage { role: "user", content: request.user_prompt.clone() },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut builder = self.client.post(&url).json(&body);
        builder = match self.auth_style {
            AuthStyle::Bearer => builder.bearer_auth(api_key),
            AuthStyle::ApiKeyHeader => builder.header("api-key", api_key),
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(error) => {
                return Ok(LlmResponse::failure(
                    self.provider,
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
                self.provider,
                &request.model,
                format!("http {status}: {body}"),
                elapsed,
            ));
        }

        let raw_body = match response.text().await {
            Ok(text) => text,
            Err(error) => {
                return Ok(LlmResponse::failure(self.provider, &request.model, error.to_string(), elapsed))
            }
        };

        if let Some(rate_limit_message) = detect_provider_error(&raw_body) {
            return Ok(LlmResponse::failure(self.provider, &request.model, rate_limit_message, elapsed));
        }

        let parsed: ChatCompletionResponse = match serde_json::from_str(&raw_body) {
            Ok(parsed) => parsed,
            Err(error) => {
                return Ok(LlmResponse::failure(self.provider, &request.model, error.to_string(), elapsed))
            }
        };

        let Some(choice) = parsed.choices.into_iter().next() else {
            return Ok(LlmResponse::failure(self.provider, &request.model, "empty choices array", elapsed));
        };

        let usage = parsed.usage.unwrap_or_default();
        Ok(LlmResponse::success(
            self.provider,
            &request.model,
            choice.message.content,
            usage.prompt_tokens,
            usage.completion_tokens,
            elapsed,
        ))
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_api_key_fails_fast_without_network_call() {
        let provider = HttpChatProvider::new(LlmProvider::Openai, "https://api.openai.com/v1", None, AuthStyle::Bearer);
        let request = LlmRequest::new("sys", "user", "gpt-4o");
        let response = provider.send(&request).await.unwrap();
        assert!(!response.success);
        assert!(!provider.is_available().await);
    }
}
