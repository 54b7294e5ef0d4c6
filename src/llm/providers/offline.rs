//! No-op client used when no provider is configured or credentialed
//! (spec.md §4.3's provider roster; grounded on
//! `original_source/src/warden/llm/providers/offline.py`).
//!
//! Always returns `success: false` without making any network call or
//! spawning a subprocess, so a CI environment with no LLM credentials at
//! all still runs the rest of the pipeline — pattern checks, AST signals,
//! and taint analysis never depend on an LLM response.

use std::time::Instant;

use async_trait::async_trait;

use crate::core::errors::Result;
use crate::llm::client::ILlmClient;
use crate::llm::types::{LlmProvider, LlmRequest, LlmResponse};

#[derive(Debug, Clone, Default)]
pub struct OfflineClient;

impl OfflineClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ILlmClient for OfflineClient {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Offline
    }

    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let started = Instant::now();
        Ok(LlmResponse::failure(
            LlmProvider::Offline,
            &request.model,
            "offline mode: no LLM provider configured",
            started.elapsed().as_millis() as u64,
        ))
    }

    async fn is_available(&self) -> bool {
        false
    }
}
