//! Ollama local-daemon client (spec.md §4.3's fast-tier local provider).
//!
//! No API key, no rate limits, but a higher failure mode: the daemon may
//! simply not be running. Uses Ollama's non-streaming `/api/chat` shape
//! (`stream: false` collapses the usual line-delimited streaming
//! response into one JSON object matching the single-`response`
//! `reqwest::Client::json()` idiom used elsewhere in this module).

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::llm::client::ILlmClient;
use crate::llm::types::{LlmProvider, LlmRequest, LlmResponse};

const DEFAULT_HOST: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(host: Option<String>) -> Self {
        Self { host: host.unwrap_or_else(|| DEFAULT_HOST.to_string()), client: reqwest::Client::new() }
    }
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[async_trait]
impl ILlmClient for OllamaClient {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Ollama
    }

    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let started = Instant::now();
        let body = OllamaChatRequest {
            model: request.model.clone(),
            messages: vec![
                OllamaMessage { role: "system", content: request.system_prompt.clone() },
                OllamaMessage { role: "user", content: request.user_prompt.clone() },
            ],
            stream: false,
        };

        let url = format!("{}/api/chat", self.host.trim_end_matches('/'));
        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(error) => {
                return Ok(LlmResponse::failure(
                    LlmProvider::Ollama,
                    &request.model,
                    format!("ollama unreachable: {error}"),
                    started.elapsed().as_millis() as u64,
                ))
            }
        };

        let status = response.status();
        let elapsed = started.elapsed().as_millis() as u64;
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(LlmResponse::failure(LlmProvider::Ollama, &request.model, format!("http {status}: {body}"), elapsed));
        }

        let parsed: OllamaChatResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(error) => return Ok(LlmResponse::failure(LlmProvider::Ollama, &request.model, error.to_string(), elapsed)),
        };

        Ok(LlmResponse::success(
            LlmProvider::Ollama,
            &request.model,
            parsed.message.content,
            parsed.prompt_eval_count,
            parsed.eval_count,
            elapsed,
        ))
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.host.trim_end_matches('/'));
        self.client.get(&url).send().await.map(|r| r.status().is_success()).unwrap_or(false)
    }
}
