//! CLI-subprocess provider clients: Claude Code and Codex (spec.md §4.3).
//!
//! Neither of these providers is an HTTP endpoint — each is a locally
//! installed command-line tool that takes a prompt on stdin and prints its
//! answer on stdout. No pack example repo subprocesses an LLM CLI, so this
//! is built directly from the client contract in spec.md §4.3:
//! `send` never raises for a transport failure (a missing binary, a
//! non-zero exit, or a forced cancellation all become `success: false`),
//! and `kill_on_drop` gives the tokio wiring here the property spec.md §5
//! asks for explicitly — a cancelled fast-tier race leg must actually stop
//! the subprocess, not just stop awaiting it.
//!
//! Both providers are single-tier per spec.md §4.3 ("the smart and fast
//! tiers collapse to one call"): a host wires the same `CliSubprocessClient`
//! into both slots of [`crate::llm::orchestrated::OrchestratedLlmClient`]
//! when it only has a CLI provider configured, so the "emergency fallback"
//! behaviour falls out of the orchestrated client's existing fast/smart
//! split rather than needing a separate code path here.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::core::errors::Result;
use crate::llm::client::ILlmClient;
use crate::llm::types::{LlmProvider, LlmRequest, LlmResponse};

/// Which CLI dialect to invoke. Claude Code and Codex take their prompt
/// differently (flag vs. subcommand) and report errors on different
/// streams, so the client keeps one small dispatch rather than guessing a
/// shared shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliDialect {
    ClaudeCode,
    Codex,
}

impl CliDialect {
    fn provider(self) -> LlmProvider {
        match self {
            Self::ClaudeCode => LlmProvider::ClaudeCode,
            Self::Codex => LlmProvider::Codex,
        }
    }

    /// Arguments that put the binary into non-interactive, single-shot
    /// mode. The prompt itself is always written to stdin so it never has
    /// to survive shell-argument quoting.
    fn args(self, model: &str) -> Vec<String> {
        match self {
            Self::ClaudeCode => vec![
                "-p".to_string(),
                "--output-format".to_string(),
                "text".to_string(),
                "--model".to_string(),
                model.to_string(),
            ],
            Self::Codex => vec!["exec".to_string(), "--model".to_string(), model.to_string(), "-".to_string()],
        }
    }
}

/// A provider client that drives a locally installed CLI as a subprocess.
#[derive(Debug, Clone)]
pub struct CliSubprocessClient {
    dialect: CliDialect,
    binary: String,
}

impl CliSubprocessClient {
    pub fn new(dialect: CliDialect, binary: impl Into<String>) -> Self {
        Self { dialect, binary: binary.into() }
    }

    pub fn claude_code() -> Self {
        Self::new(CliDialect::ClaudeCode, "claude")
    }

    pub fn codex() -> Self {
        Self::new(CliDialect::Codex, "codex")
    }
}

#[async_trait]
impl ILlmClient for CliSubprocessClient {
    fn provider(&self) -> LlmProvider {
        self.dialect.provider()
    }

    /// Claude Code runs its own internal agentic loop, so unlike the HTTP
    /// providers this client is exempt from the `send_with_tools` wrapper
    /// (spec.md §4.3) — there is no tool-use marker to detect, the CLI
    /// already resolved any tool calls before printing its final answer.
    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let started = Instant::now();
        let prompt = format!("{}\n\n{}", request.system_prompt, request.user_prompt);

        let mut child = match Command::new(&self.binary)
            .args(self.dialect.args(&request.model))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(error) => {
                return Ok(LlmResponse::failure(
                    self.provider(),
                    &request.model,
                    format!("failed to spawn {}: {error}", self.binary),
                    started.elapsed().as_millis() as u64,
                ))
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(error) = stdin.write_all(prompt.as_bytes()).await {
                return Ok(LlmResponse::failure(
                    self.provider(),
                    &request.model,
                    format!("failed writing prompt to {}: {error}", self.binary),
                    started.elapsed().as_millis() as u64,
                ));
            }
            drop(stdin);
        }

        let output = match child.wait_with_output().await {
            Ok(output) => output,
            Err(error) => {
                return Ok(LlmResponse::failure(
                    self.provider(),
                    &request.model,
                    format!("{} did not exit cleanly: {error}", self.binary),
                    started.elapsed().as_millis() as u64,
                ))
            }
        };
        let elapsed = started.elapsed().as_millis() as u64;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(LlmResponse::failure(
                self.provider(),
                &request.model,
                format!("{} exited with {}: {stderr}", self.binary, output.status),
                elapsed,
            ));
        }

        let content = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if content.is_empty() {
            return Ok(LlmResponse::failure(self.provider(), &request.model, "empty response from CLI", elapsed));
        }

        // CLI tools don't report token usage on stdout; the resilience and
        // metrics layers treat a missing count as zero rather than estimate.
        Ok(LlmResponse::success(self.provider(), &request.model, content, 0, 0, elapsed))
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_reports_failure_not_error() {
        let client = CliSubprocessClient::new(CliDialect::ClaudeCode, "warden-nonexistent-cli-binary");
        let request = LlmRequest::new("sys", "user", "model");
        let response = client.send(&request).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.provider, LlmProvider::ClaudeCode);
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let client = CliSubprocessClient::new(CliDialect::Codex, "warden-nonexistent-cli-binary");
        assert!(!client.is_available().await);
    }

    #[test]
    fn dialect_maps_to_distinct_providers() {
        assert_eq!(CliDialect::ClaudeCode.provider(), LlmProvider::ClaudeCode);
        assert_eq!(CliDialect::Codex.provider(), LlmProvider::Codex);
    }
}
