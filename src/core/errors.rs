//! Error types for the warden-core library.
//!
//! This module provides structured error handling for every warden
//! operation, following the taxonomy of configuration, transport, model,
//! analyzer, frame, rate-limit, timeout, and fatal errors so that callers
//! can match on *kind* without parsing message strings.

use std::io;
use std::num::{ParseFloatError, ParseIntError};
use std::str::Utf8Error;

use thiserror::Error;

/// Main result type for warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;

/// Comprehensive error type for all warden-core operations.
#[derive(Error, Debug)]
pub enum WardenError {
    /// I/O related errors (file operations, etc.)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors: invalid YAML, unknown provider, malformed rule.
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Parsing and language-processing errors (tree-sitter, YAML packs).
    #[error("Parse error in {language}: {message}")]
    Parse {
        /// Programming language (or "yaml") being parsed
        language: String,
        /// Error description
        message: String,
        /// File path where the error occurred
        file_path: Option<String>,
        /// Line number, if known
        line: Option<usize>,
    },

    /// Transport errors from an LLM provider: HTTP, subprocess, stdio.
    ///
    /// Never escapes a provider client — callers convert these into
    /// `LlmResponse { success: false, .. }` rather than propagating them.
    #[error("Transport error ({provider}): {message}")]
    Transport {
        /// Provider identifier
        provider: String,
        /// Error description
        message: String,
        /// Whether a retry is worth attempting (false for 404/auth failures)
        retryable: bool,
    },

    /// The LLM produced invalid JSON or empty content for a structured call.
    #[error("Model error ({provider}/{model}): {message}")]
    Model {
        /// Provider identifier
        provider: String,
        /// Model identifier
        model: String,
        /// Error description
        message: String,
    },

    /// A validation frame raised an unrecoverable error while executing.
    #[error("Frame '{frame_id}' error: {message}")]
    Frame {
        /// Frame identifier
        frame_id: String,
        /// Error description
        message: String,
    },

    /// A provider rate limit (HTTP 429) was hit.
    #[error("Rate limited by {provider}, retry after {retry_after_secs:?}s")]
    RateLimit {
        /// Provider identifier
        provider: String,
        /// Seconds the caller should wait before retrying, if known
        retry_after_secs: Option<u64>,
    },

    /// A per-file, per-frame, or per-pipeline deadline elapsed.
    #[error("Timeout in {scope}: exceeded {elapsed_secs}s")]
    Timeout {
        /// What deadline fired: "file", "frame", or "pipeline"
        scope: String,
        /// Elapsed seconds at the point of cancellation
        elapsed_secs: f64,
    },

    /// The orchestrator-level circuit breaker is open for this provider.
    #[error("Circuit open for provider {provider}")]
    CircuitOpen {
        /// Provider identifier
        provider: String,
    },

    /// The on-disk baseline file could not be parsed; treated as a warning
    /// upstream, but the parse failure itself is represented here.
    #[error("Baseline error: {message}")]
    Baseline {
        /// Error description
        message: String,
    },

    /// Analysis pipeline errors (phase-level failures).
    #[error("Pipeline error at phase '{phase}': {message}")]
    Pipeline {
        /// Phase name where the error occurred
        phase: String,
        /// Error description
        message: String,
    },

    /// Cache and storage errors (findings cache).
    #[error("Cache error: {message}")]
    Cache {
        /// Error description
        message: String,
        /// Cache key that caused the issue
        key: Option<String>,
    },

    /// Serialization/deserialization errors.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
    },

    /// Validation errors for input data.
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Generic internal errors.
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },

    /// Unsupported operation or feature.
    #[error("Unsupported: {message}")]
    Unsupported {
        /// Error description
        message: String,
    },
}

impl WardenError {
    /// Create a new I/O error with context.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context.
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new parse error.
    pub fn parse(language: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.into(),
            file_path: None,
            line: None,
        }
    }

    /// Create a new parse error with file context.
    pub fn parse_with_location(
        language: impl Into<String>,
        message: impl Into<String>,
        file_path: impl Into<String>,
        line: Option<usize>,
    ) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.into(),
            file_path: Some(file_path.into()),
            line,
        }
    }

    /// Create a new transport error.
    pub fn transport(provider: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Create a new model-output error.
    pub fn model(provider: impl Into<String>, model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Model {
            provider: provider.into(),
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create a new frame error.
    pub fn frame(frame_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Frame {
            frame_id: frame_id.into(),
            message: message.into(),
        }
    }

    /// Create a new rate-limit error.
    pub fn rate_limit(provider: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self::RateLimit {
            provider: provider.into(),
            retry_after_secs,
        }
    }

    /// Create a new timeout error.
    pub fn timeout(scope: impl Into<String>, elapsed_secs: f64) -> Self {
        Self::Timeout {
            scope: scope.into(),
            elapsed_secs,
        }
    }

    /// Create a new circuit-open error.
    pub fn circuit_open(provider: impl Into<String>) -> Self {
        Self::CircuitOpen {
            provider: provider.into(),
        }
    }

    /// Create a new baseline error.
    pub fn baseline(message: impl Into<String>) -> Self {
        Self::Baseline {
            message: message.into(),
        }
    }

    /// Create a new pipeline error.
    pub fn pipeline(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pipeline {
            phase: phase.into(),
            message: message.into(),
        }
    }

    /// Create a new cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
            key: None,
        }
    }

    /// Create a new validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Create a new unsupported-operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Add context to an existing error. Only `Internal` carries a free-form
    /// context slot; other variants are already fully structured.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        if let Self::Internal { context: ctx, .. } = &mut self {
            *ctx = Some(context.into());
        }
        self
    }

    /// Whether a retry loop should give up immediately on this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::RateLimit { .. } | Self::Timeout { .. } => true,
            Self::CircuitOpen { .. } => false,
            _ => false,
        }
    }
}

impl From<io::Error> for WardenError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for WardenError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON error: {err}"),
            data_type: Some("JSON".to_string()),
        }
    }
}

impl From<serde_yaml::Error> for WardenError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML error: {err}"),
            data_type: Some("YAML".to_string()),
        }
    }
}

impl From<ParseIntError> for WardenError {
    fn from(err: ParseIntError) -> Self {
        Self::validation(format!("Invalid integer: {err}"))
    }
}

impl From<ParseFloatError> for WardenError {
    fn from(err: ParseFloatError) -> Self {
        Self::validation(format!("Invalid float: {err}"))
    }
}

impl From<Utf8Error> for WardenError {
    fn from(err: Utf8Error) -> Self {
        Self::parse("unknown", format!("UTF-8 encoding error: {err}"))
    }
}

impl From<reqwest::Error> for WardenError {
    fn from(err: reqwest::Error) -> Self {
        let retryable = !err.is_builder() && !(err.status().map(|s| s.as_u16()) == Some(404));
        Self::transport("unknown", err.to_string(), retryable)
    }
}

/// Result extension trait for adding context to errors.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result.
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<WardenError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = WardenError::config("invalid configuration");
        assert!(matches!(err, WardenError::Config { .. }));

        let err = WardenError::parse("python", "syntax error");
        assert!(matches!(err, WardenError::Parse { .. }));
    }

    #[test]
    fn test_error_with_context() {
        let err = WardenError::internal("something went wrong").with_context("during file processing");

        if let WardenError::Internal { context, .. } = err {
            assert_eq!(context, Some("during file processing".to_string()));
        } else {
            panic!("expected Internal error");
        }
    }

    #[test]
    fn test_transport_retryability() {
        let retryable = WardenError::transport("openai", "connection reset", true);
        assert!(retryable.is_retryable());

        let not_retryable = WardenError::transport("openai", "model not found", false);
        assert!(!not_retryable.is_retryable());
    }

    #[test]
    fn test_result_extension() {
        let result: std::result::Result<i32, std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));

        let warden_result = result.context("failed to read configuration file");
        assert!(warden_result.is_err());
    }
}
