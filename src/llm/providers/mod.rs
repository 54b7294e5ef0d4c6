//! Concrete [`crate::llm::client::ILlmClient`] implementations (spec.md
//! §4.3's provider roster).
//!
//! `http_chat` covers every OpenAI-compatible hosted API (OpenAI itself,
//! Azure OpenAI, Groq, OpenRouter, DeepSeek, QwenCode) behind one
//! generalized client, grounded on a reqwest-based chat-completion client
//! usage pattern. `anthropic` and `gemini` get their own modules because their
//! wire formats diverge from the OpenAI chat-completion shape. `ollama`
//! is a local HTTP daemon with its own (simpler) schema. `cli` covers the
//! two subprocess-backed providers (Claude Code, Codex). `offline` is the
//! always-fails no-op used when nothing is configured.

pub mod anthropic;
pub mod cli;
pub mod gemini;
pub mod http_chat;
pub mod offline;
pub mod ollama;

pub use anthropic::AnthropicClient;
pub use cli::CliSubprocessClient;
pub use gemini::GeminiClient;
pub use http_chat::HttpChatProvider;
pub use offline::OfflineClient;
pub use ollama::OllamaClient;
