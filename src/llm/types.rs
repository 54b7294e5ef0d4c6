//! Shared LLM request/response/analysis types (spec.md §4.3, §6).
//!
//! Grounded on `original_source/src/warden/llm/types.py`'s dataclasses.
//! `LlmProvider` is widened past `types.py`'s enum
//! (`deepseek, qwencode, anthropic, openai, azure_openai, groq,
//! openrouter`) to the full roster spec.md §4.3 describes the registry
//! supporting: `gemini`, `ollama`, `claude_code`, `codex`, and an `offline`
//! no-op used when no credentials are configured at all.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One entry in the LLM provider registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Deepseek,
    QwenCode,
    Anthropic,
    Openai,
    AzureOpenai,
    Groq,
    Openrouter,
    Gemini,
    Ollama,
    ClaudeCode,
    Codex,
    /// No-op client used when nothing else is configured or credentialed;
    /// always returns `success: false` without making any network call.
    Offline,
}

impl LlmProvider {
    /// Parse the `.warden/config.yaml`/`WARDEN_LLM_PROVIDER` string form.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().replace('-', "_").as_str() {
            "deepseek" => Some(Self::Deepseek),
            "qwencode" | "qwen_code" => Some(Self::QwenCode),
            "anthropic" => Some(Self::Anthropic),
            "openai" => Some(Self::Openai),
            "azure_openai" | "azure" => Some(Self::AzureOpenai),
            "groq" => Some(Self::Groq),
            "openrouter" => Some(Self::Openrouter),
            "gemini" => Some(Self::Gemini),
            "ollama" => Some(Self::Ollama),
            "claude_code" => Some(Self::ClaudeCode),
            "codex" => Some(Self::Codex),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deepseek => "deepseek",
            Self::QwenCode => "qwencode",
            Self::Anthropic => "anthropic",
            Self::Openai => "openai",
            Self::AzureOpenai => "azure_openai",
            Self::Groq => "groq",
            Self::Openrouter => "openrouter",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::ClaudeCode => "claude_code",
            Self::Codex => "codex",
            Self::Offline => "offline",
        }
    }

    /// Providers whose "transport" is local (CLI subprocess or localhost
    /// HTTP), which earn the higher dynamic-timeout floor (spec.md §4.6).
    pub fn is_local(self) -> bool {
        matches!(self, Self::Ollama | Self::ClaudeCode | Self::Codex)
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat-completion request sent to a provider client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Whether the orchestrated client should attempt the fast tier before
    /// falling back to smart (spec.md §4.3's tiered-racing contract).
    #[serde(default = "default_true")]
    pub use_fast_tier: bool,
}

fn default_true() -> bool {
    true
}

impl LlmRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            model: model.into(),
            max_tokens: None,
            temperature: None,
            use_fast_tier: true,
        }
    }
}

/// A provider client's response. Per spec.md §4.3, an individual
/// provider's `send` never raises for transport failures — it always
/// returns `Ok` with `success: false` and an `error` message instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub success: bool,
    pub content: String,
    pub provider: LlmProvider,
    pub model: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    pub duration_ms: u64,
}

impl LlmResponse {
    pub fn failure(provider: LlmProvider, model: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            content: String::new(),
            provider,
            model: model.into(),
            error: Some(error.into()),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms,
        }
    }

    pub fn success(
        provider: LlmProvider,
        model: impl Into<String>,
        content: impl Into<String>,
        input_tokens: u32,
        output_tokens: u32,
        duration_ms: u64,
    ) -> Self {
        Self {
            success: true,
            content: content.into(),
            provider,
            model: model.into(),
            error: None,
            input_tokens,
            output_tokens,
            duration_ms,
        }
    }
}

/// One finding surfaced by an LLM security-analysis call (spec.md §6's
/// four-value `severity` schema is authoritative over the narrower
/// three-value variant seen in one `providers/base.py` prompt instance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisIssue {
    pub severity: Severity,
    pub category: String,
    pub description: String,
    pub line: Option<u32>,
    #[serde(default)]
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// Top-level result of an LLM security-analysis call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub findings: Vec<AnalysisIssue>,
}

/// Characteristics an LLM classification call extracts about a file
/// before frame selection (spec.md §4.7's Triage phase).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationCharacteristics {
    #[serde(default)]
    pub is_test_file: bool,
    #[serde(default)]
    pub is_generated: bool,
    #[serde(default)]
    pub is_entry_point: bool,
    #[serde(default)]
    pub handles_user_input: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: String,
    #[serde(default)]
    pub characteristics: ClassificationCharacteristics,
    #[serde(default)]
    pub confidence: f64,
}

/// Substrings that indicate a rate-limit/quota response embedded in a
/// nominally-successful HTTP body (`providers/base.py::_RATE_LIMIT_PATTERNS`).
const RATE_LIMIT_PATTERNS: &[&str] = &[
    "usage limit",
    "rate limit",
    "try again in",
    "too many requests",
    "quota exceeded",
    "request limit reached",
    "throttled",
];

/// Scan `content` for an embedded rate-limit message, truncated to 200
/// chars. Used by provider clients parsing a 200-status body that still
/// represents a quota failure.
pub fn detect_provider_error(content: &str) -> Option<String> {
    let lower = content.to_ascii_lowercase();
    for pattern in RATE_LIMIT_PATTERNS {
        if let Some(pos) = lower.find(pattern) {
            let end = (pos + 200).min(content.len());
            let start = pos.min(content.len());
            return Some(content[start..end].to_string());
        }
    }
    None
}
