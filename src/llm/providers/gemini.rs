//! Gemini `generateContent` client (spec.md §4.3).
//!
//! Direct generalization of the
//! `{GeminiRequest, GeminiContent, GeminiPart,
//! GeminiGenerationConfig, GeminiResponse}` DTOs and a
//! `query_gemini`-style request-building/error-handling
//! shape, adapted from a fixed refactoring-plan prompt to an
//! arbitrary system+user prompt pair (Gemini has no separate system-role
//! message; it is folded into the single `contents[0].parts[0].text`).

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::llm::client::ILlmClient;
use crate::llm::types::{detect_provider_error, LlmProvider, LlmRequest, LlmResponse};

#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self { base_url: base_url.into(), api_key, client: reqwest::Client::new() }
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct UsageMetadata {
    #[serde(default, rename = "promptTokenCount")]
    prompt_token_count: u32,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: u32,
}

#[async_trait]
impl ILlmClient for GeminiClient {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Gemini
    }

    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let started = Instant::now();
        let Some(api_key) = &self.api_key else {
            return Ok(LlmResponse::failure(
                LlmProvider::Gemini,
                &request.model,
                "no API key configured",
                started.elapsed().as_millis() as u64,
            ));
        };

        let combined_prompt = format!("{}\n\n{}", request.system_prompt, request.user_prompt);
        let body = GeminiRequest {
            contents: vec![GeminiContent { parts: vec![GeminiPart { text: combined_prompt }] }],
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature.unwrap_or(0.2),
                max_output_tokens: request.max_tokens.unwrap_or(8192),
            },
        };

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            request.model,
            api_key
        );

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(error) => {
                return Ok(LlmResponse::failure(
                    LlmProvider::Gemini,
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
            return Ok(LlmResponse::failure(LlmProvider::Gemini, &request.model, format!("http {status}: {body}"), elapsed));
        }

        let raw_body = match response.text().await {
            Ok(text) => text,
            Err(error) => return Ok(LlmResponse::failure(LlmProvider::Gemini, &request.model, error.to_string(), elapsed)),
        };

        if let Some(rate_limit_message) = detect_provider_error(&raw_body) {
            return Ok(LlmResponse::failure(LlmProvider::Gemini, &request.model, rate_limit_message, elapsed));
        }

        let parsed: GeminiResponse = match serde_json::from_str(&raw_body) {
            Ok(parsed) => parsed,
            Err(error) => return Ok(LlmResponse::failure(LlmProvider::Gemini, &request.model, error.to_string(), elapsed)),
        };

        let Some(candidate) = parsed.candidates.into_iter().next() else {
            return Ok(LlmResponse::failure(LlmProvider::Gemini, &request.model, "no candidates in response", elapsed));
        };
        let Some(part) = candidate.content.parts.into_iter().next() else {
            return Ok(LlmResponse::failure(LlmProvider::Gemini, &request.model, "no parts in candidate", elapsed));
        };

        let usage = parsed.usage_metadata.unwrap_or_default();
        Ok(LlmResponse::success(
            LlmProvider::Gemini,
            &request.model,
            part.text,
            usage.prompt_token_count,
            usage.candidates_token_count,
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
    async fn missing_api_key_fails_without_network_call() {
        let client = GeminiClient::new("https://generativelanguage.googleapis.com/v1beta/models", None);
        let request = LlmRequest::new("sys", "user", "gemini-2.5-pro");
        let response = client.send(&request).await.unwrap();
        assert!(!response.success);
    }
}
