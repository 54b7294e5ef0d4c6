//! Source-to-sink taint analysis (spec.md §4.1/§4.2).

pub mod analyzer;
pub mod catalog;
pub mod signals;

pub use analyzer::TaintAnalyzer;
pub use catalog::{SinkType, TaintCatalog};
pub use signals::SignalInference;

use serde::{Deserialize, Serialize};

/// Evidence that a source of taint was identified at a given line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaintSource {
    /// Source expression/name (e.g. `request.args`).
    pub name: String,
    /// Human-readable role (e.g. "user input").
    pub kind: String,
    /// 1-indexed line number.
    pub line: usize,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
}

/// Evidence that a sink was identified at a given line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaintSink {
    /// Sink expression/name (e.g. `cursor.execute`).
    pub name: String,
    /// Sink-type vocabulary entry (spec.md §6).
    pub kind: String,
    /// 1-indexed line number.
    pub line: usize,
}

/// One source-to-sink data flow, with transformation and sanitizer
/// evidence (spec.md §3 `TaintPath`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaintPath {
    /// Where the tainted value entered.
    pub source: TaintSource,
    /// Where the tainted value was used dangerously.
    pub sink: TaintSink,
    /// Ordered intermediate variable names the value passed through.
    pub transformations: Vec<String>,
    /// Sanitizer names detected wrapping the argument, if any.
    pub sanitizers: Vec<String>,
    /// True if a known sanitizer wraps the tainted argument.
    pub is_sanitized: bool,
    /// Final confidence after source/propagation/sanitizer adjustments.
    pub confidence: f64,
}

impl TaintPath {
    /// Apply the sanitizer penalty to a base confidence, matching
    /// spec.md §4.1 ("sanitizer penalty: ×0.3").
    pub fn apply_sanitizer_penalty(base_confidence: f64, is_sanitized: bool, penalty: f64) -> f64 {
        if is_sanitized {
            base_confidence * penalty
        } else {
            base_confidence
        }
    }
}
