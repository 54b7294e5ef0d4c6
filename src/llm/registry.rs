//! Process-wide provider registry (spec.md §4.3 "Provider registry").
//!
//! A map from provider id to a factory that turns a [`ProviderSpec`]
//! (the connection details `.warden/config.yaml`'s `llm.smart`/`llm.fast`
//! entries carry, spec.md §6) into a ready [`ILlmClient`]. Providers
//! "self-register at module load" per the spec; in Rust that is most
//! naturally a fixed compile-time table rather than a runtime plugin
//! mechanism — the `once_cell::Lazy` static below is populated once, on
//! first use, and every entry in it is exactly one of the clients in
//! `llm::providers`. `create` fails fast with the full list of registered
//! provider ids when asked for one that isn't in the table, matching the
//! spec's "fails fast with a listing of registered providers" contract.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::core::errors::{Result, WardenError};
use crate::llm::client::ILlmClient;
use crate::llm::providers::cli::CliDialect;
use crate::llm::providers::http_chat::AuthStyle;
use crate::llm::providers::{AnthropicClient, CliSubprocessClient, GeminiClient, HttpChatProvider, OfflineClient, OllamaClient};
use crate::llm::types::LlmProvider;

/// Connection details for one provider entry, as configured in
/// `.warden/config.yaml`'s `llm` block.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub provider: LlmProvider,
    pub model: String,
    /// Overrides the provider's default base URL / binary name.
    pub base_url: Option<String>,
}

type Factory = fn(&ProviderSpec) -> Arc<dyn ILlmClient>;

/// The exact environment variable the spec names for each provider's
/// credential (spec.md §6). A provider absent from this map (the
/// CLI-subprocess and offline providers) needs no environment credential.
fn credential_env_var(provider: LlmProvider) -> Option<&'static str> {
    match provider {
        LlmProvider::Openai => Some("OPENAI_API_KEY"),
        LlmProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
        LlmProvider::AzureOpenai => Some("AZURE_OPENAI_API_KEY"),
        LlmProvider::Groq => Some("GROQ_API_KEY"),
        LlmProvider::Openrouter => Some("OPENROUTER_API_KEY"),
        LlmProvider::Deepseek => Some("DEEPSEEK_API_KEY"),
        LlmProvider::QwenCode => Some("QWEN_API_KEY"),
        LlmProvider::Gemini => Some("GEMINI_API_KEY"),
        LlmProvider::Ollama => Some("OLLAMA_HOST"),
        LlmProvider::ClaudeCode | LlmProvider::Codex | LlmProvider::Offline => None,
    }
}

/// Whether a provider's required credential is present in the
/// environment. A missing credential silently disables the provider
/// (spec.md §6) rather than erroring — callers are expected to skip
/// unavailable providers via [`ILlmClient::is_available`] rather than
/// fail the whole registry lookup.
pub fn credential_present(provider: LlmProvider) -> bool {
    match credential_env_var(provider) {
        Some(var) => env::var(var).is_ok(),
        None => true,
    }
}

fn api_key(provider: LlmProvider) -> Option<String> {
    credential_env_var(provider).and_then(|var| env::var(var).ok())
}

fn default_base_url(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::Openai => "https://api.openai.com/v1",
        LlmProvider::AzureOpenai => "https://management.azure.com/openai/v1",
        LlmProvider::Groq => "https://api.groq.com/openai/v1",
        LlmProvider::Openrouter => "https://openrouter.ai/api/v1",
        LlmProvider::Deepseek => "https://api.deepseek.com/v1",
        LlmProvider::QwenCode => "https://dashscope.aliyuncs.com/compatible-mode/v1",
        LlmProvider::Anthropic => "https://api.anthropic.com/v1",
        LlmProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        _ => "",
    }
}

static REGISTRY: Lazy<HashMap<LlmProvider, Factory>> = Lazy::new(|| {
    let mut table: HashMap<LlmProvider, Factory> = HashMap::new();

    table.insert(LlmProvider::Openai, |spec| {
        Arc::new(HttpChatProvider::new(
            LlmProvider::Openai,
            spec.base_url.clone().unwrap_or_else(|| default_base_url(LlmProvider::Openai).to_string()),
            api_key(LlmProvider::Openai),
            AuthStyle::Bearer,
        ))
    });
    table.insert(LlmProvider::AzureOpenai, |spec| {
        Arc::new(HttpChatProvider::new(
            LlmProvider::AzureOpenai,
            spec.base_url.clone().unwrap_or_else(|| default_base_url(LlmProvider::AzureOpenai).to_string()),
            api_key(LlmProvider::AzureOpenai),
            AuthStyle::ApiKeyHeader,
        ))
    });
    table.insert(LlmProvider::Groq, |spec| {
        Arc::new(HttpChatProvider::new(
            LlmProvider::Groq,
            spec.base_url.clone().unwrap_or_else(|| default_base_url(LlmProvider::Groq).to_string()),
            api_key(LlmProvider::Groq),
            AuthStyle::Bearer,
        ))
    });
    table.insert(LlmProvider::Openrouter, |spec| {
        Arc::new(HttpChatProvider::new(
            LlmProvider::Openrouter,
            spec.base_url.clone().unwrap_or_else(|| default_base_url(LlmProvider::Openrouter).to_string()),
            api_key(LlmProvider::Openrouter),
            AuthStyle::Bearer,
        ))
    });
    table.insert(LlmProvider::Deepseek, |spec| {
        Arc::new(HttpChatProvider::new(
            LlmProvider::Deepseek,
            spec.base_url.clone().unwrap_or_else(|| default_base_url(LlmProvider::Deepseek).to_string()),
            api_key(LlmProvider::Deepseek),
            AuthStyle::Bearer,
        ))
    });
    table.insert(LlmProvider::QwenCode, |spec| {
        Arc::new(HttpChatProvider::new(
            LlmProvider::QwenCode,
            spec.base_url.clone().unwrap_or_else(|| default_base_url(LlmProvider::QwenCode).to_string()),
            api_key(LlmProvider::QwenCode),
            AuthStyle::Bearer,
        ))
    });
    table.insert(LlmProvider::Anthropic, |spec| {
        Arc::new(AnthropicClient::new(
            spec.base_url.clone().unwrap_or_else(|| default_base_url(LlmProvider::Anthropic).to_string()),
            api_key(LlmProvider::Anthropic),
        ))
    });
    table.insert(LlmProvider::Gemini, |spec| {
        Arc::new(GeminiClient::new(
            spec.base_url.clone().unwrap_or_else(|| default_base_url(LlmProvider::Gemini).to_string()),
            api_key(LlmProvider::Gemini),
        ))
    });
    table.insert(LlmProvider::Ollama, |spec| Arc::new(OllamaClient::new(spec.base_url.clone())));
    table.insert(LlmProvider::ClaudeCode, |spec| {
        Arc::new(CliSubprocessClient::new(CliDialect::ClaudeCode, spec.base_url.clone().unwrap_or_else(|| "claude".to_string())))
    });
    table.insert(LlmProvider::Codex, |spec| {
        Arc::new(CliSubprocessClient::new(CliDialect::Codex, spec.base_url.clone().unwrap_or_else(|| "codex".to_string())))
    });
    table.insert(LlmProvider::Offline, |_spec| Arc::new(OfflineClient::new()));

    table
});

/// Every provider id currently registered, for diagnostics and the
/// fail-fast error message in [`create`].
pub fn registered_providers() -> Vec<LlmProvider> {
    let mut providers: Vec<LlmProvider> = REGISTRY.keys().copied().collect();
    providers.sort_by_key(|p| p.as_str());
    providers
}

/// Construct a ready client for `spec.provider`. Fails fast (no network
/// call) for an unregistered provider id, listing what is registered.
pub fn create(spec: &ProviderSpec) -> Result<Arc<dyn ILlmClient>> {
    match REGISTRY.get(&spec.provider) {
        Some(factory) => Ok(factory(spec)),
        None => Err(WardenError::config(format!(
            "unknown LLM provider '{}'; registered providers: {}",
            spec.provider.as_str(),
            registered_providers().iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", "),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(provider: LlmProvider) -> ProviderSpec {
        ProviderSpec { provider, model: "m".to_string(), base_url: None }
    }

    #[test]
    fn every_llm_provider_variant_is_registered() {
        for provider in [
            LlmProvider::Deepseek,
            LlmProvider::QwenCode,
            LlmProvider::Anthropic,
            LlmProvider::Openai,
            LlmProvider::AzureOpenai,
            LlmProvider::Groq,
            LlmProvider::Openrouter,
            LlmProvider::Gemini,
            LlmProvider::Ollama,
            LlmProvider::ClaudeCode,
            LlmProvider::Codex,
            LlmProvider::Offline,
        ] {
            let client = create(&spec(provider)).unwrap();
            assert_eq!(client.provider(), provider);
        }
    }

    #[test]
    fn offline_client_needs_no_credential() {
        assert!(credential_present(LlmProvider::Offline));
        assert!(credential_present(LlmProvider::ClaudeCode));
    }

    #[test]
    fn registered_providers_lists_every_entry() {
        assert_eq!(registered_providers().len(), 12);
    }
}
