//! LLM request metrics collection and per-frame cost attribution
//! (spec.md §4.3's tiered-cost-accounting paragraph).
//!
//! Port of `original_source/src/warden/llm/metrics.py`'s
//! `LLMMetricsCollector`: a flat append-only request log plus aggregation
//! helpers. Python's `ContextVar`-based `frame_scope` context manager
//! becomes an explicit `frame_name: Option<&str>` parameter on
//! [`LlmMetricsCollector::record_request`] — the frame executor calls it
//! from inside its own per-frame async task, so there is no ambient
//! task-local state to thread through in the Rust translation.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::llm::types::LlmProvider;

/// Which race tier a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Fast,
    Smart,
}

/// Metrics for a single LLM request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequestMetrics {
    pub tier: Tier,
    pub provider: LlmProvider,
    pub model: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub frame_name: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

const UNATTRIBUTED: &str = "_unattributed";

/// Per-frame rollup of LLM usage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub frame_name: String,
    pub llm_calls: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost_usd: f64,
    pub total_duration_ms: u64,
    pub errors: u32,
}

/// Collects every LLM request made during a scan for later cost/perf
/// reporting. One instance per scan, shared behind a `parking_lot::Mutex`
/// the way `orchestrated.py`'s `metrics.record_request(...)` calls assume
/// a process-wide singleton guarded by `threading.Lock`.
#[derive(Debug, Default)]
pub struct LlmMetricsCollector {
    requests: Mutex<Vec<LlmRequestMetrics>>,
}

impl LlmMetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request. `frame_name` defaults to `_unattributed` when
    /// not supplied, matching the Python source's context-var fallback.
    #[allow(clippy::too_many_arguments)]
    pub fn record_request(
        &self,
        tier: Tier,
        provider: LlmProvider,
        model: impl Into<String>,
        success: bool,
        duration_ms: u64,
        error: Option<String>,
        frame_name: Option<&str>,
        input_tokens: u32,
        output_tokens: u32,
    ) {
        self.requests.lock().push(LlmRequestMetrics {
            tier,
            provider,
            model: model.into(),
            success,
            duration_ms,
            error,
            frame_name: frame_name.unwrap_or(UNATTRIBUTED).to_string(),
            input_tokens,
            output_tokens,
        });
    }

    /// Per-frame metrics, sorted by estimated cost descending.
    pub fn frame_metrics(&self) -> Vec<FrameMetrics> {
        let requests = self.requests.lock();
        let mut by_frame: HashMap<String, FrameMetrics> = HashMap::new();
        for request in requests.iter() {
            let entry = by_frame
                .entry(request.frame_name.clone())
                .or_insert_with(|| FrameMetrics {
                    frame_name: request.frame_name.clone(),
                    ..Default::default()
                });
            entry.llm_calls += 1;
            entry.input_tokens += request.input_tokens as u64;
            entry.output_tokens += request.output_tokens as u64;
            entry.total_duration_ms += request.duration_ms;
            entry.estimated_cost_usd += estimate_cost(request.input_tokens, request.output_tokens, &request.model);
            if !request.success {
                entry.errors += 1;
            }
        }
        let mut rows: Vec<FrameMetrics> = by_frame.into_values().collect();
        rows.sort_by(|a, b| b.estimated_cost_usd.partial_cmp(&a.estimated_cost_usd).unwrap_or(std::cmp::Ordering::Equal));
        rows
    }

    /// Whether the fast tier is failing often enough to be a reported
    /// issue (>10% failure rate, spec.md §4.3's tiered-racing contract).
    pub fn fast_tier_reliability_issue(&self) -> Option<(u32, Vec<LlmProvider>)> {
        let requests = self.requests.lock();
        let fast: Vec<&LlmRequestMetrics> = requests.iter().filter(|r| r.tier == Tier::Fast).collect();
        if fast.is_empty() {
            return None;
        }
        let failed: Vec<&&LlmRequestMetrics> = fast.iter().filter(|r| !r.success).collect();
        let failure_rate = failed.len() as f64 / fast.len() as f64;
        if failure_rate > 0.1 {
            let mut providers: Vec<LlmProvider> = failed.iter().map(|r| r.provider).collect();
            providers.sort_by_key(|p| p.as_str());
            providers.dedup();
            Some((failed.len() as u32, providers))
        } else {
            None
        }
    }

    /// Requests that failed with an embedded rate-limit message, across
    /// all tiers.
    pub fn rate_limited_requests(&self) -> Vec<LlmProvider> {
        let requests = self.requests.lock();
        let mut providers: Vec<LlmProvider> = requests
            .iter()
            .filter(|r| !r.success && r.error.as_deref().unwrap_or_default().to_ascii_lowercase().contains("rate limit"))
            .map(|r| r.provider)
            .collect();
        providers.sort_by_key(|p| p.as_str());
        providers.dedup();
        providers
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(self.requests.lock().iter().map(|r| r.duration_ms).sum())
    }
}

/// Approximate USD cost per request, keyed by model name. Defaults to a
/// conservative mid-tier rate for unrecognised models
/// (`metrics.py::_estimate_cost`'s pricing table).
fn estimate_cost(input_tokens: u32, output_tokens: u32, model: &str) -> f64 {
    let (input_rate, output_rate) = match model {
        "gpt-4" => (0.03, 0.06),
        "gpt-4o" => (0.005, 0.015),
        "gpt-3.5-turbo" => (0.0005, 0.0015),
        _ => (0.001, 0.002),
    };
    (input_tokens as f64 / 1000.0 * input_rate) + (output_tokens as f64 / 1000.0 * output_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_aggregates_per_frame() {
        let collector = LlmMetricsCollector::new();
        collector.record_request(Tier::Fast, LlmProvider::Ollama, "llama3", true, 120, None, Some("security"), 100, 50);
        collector.record_request(Tier::Smart, LlmProvider::Anthropic, "claude-sonnet", true, 900, None, Some("security"), 200, 100);
        collector.record_request(Tier::Fast, LlmProvider::Ollama, "llama3", false, 50, Some("timeout".into()), Some("lint"), 0, 0);

        let frames = collector.frame_metrics();
        assert_eq!(frames.len(), 2);
        let security = frames.iter().find(|f| f.frame_name == "security").unwrap();
        assert_eq!(security.llm_calls, 2);
        assert_eq!(security.errors, 0);
        let lint = frames.iter().find(|f| f.frame_name == "lint").unwrap();
        assert_eq!(lint.errors, 1);
    }

    #[test]
    fn unattributed_frame_used_when_none_given() {
        let collector = LlmMetricsCollector::new();
        collector.record_request(Tier::Fast, LlmProvider::Groq, "m", true, 10, None, None, 1, 1);
        let frames = collector.frame_metrics();
        assert_eq!(frames[0].frame_name, "_unattributed");
    }

    #[test]
    fn fast_tier_reliability_issue_detected_above_ten_percent() {
        let collector = LlmMetricsCollector::new();
        for _ in 0..9 {
            collector.record_request(Tier::Fast, LlmProvider::Ollama, "m", true, 10, None, None, 1, 1);
        }
        collector.record_request(Tier::Fast, LlmProvider::Ollama, "m", false, 10, Some("timeout".into()), None, 0, 0);
        collector.record_request(Tier::Fast, LlmProvider::Ollama, "m", false, 10, Some("timeout".into()), None, 0, 0);
        let issue = collector.fast_tier_reliability_issue();
        assert!(issue.is_some());
    }

    #[test]
    fn rate_limited_requests_detected_across_tiers() {
        let collector = LlmMetricsCollector::new();
        collector.record_request(Tier::Smart, LlmProvider::Openrouter, "m", false, 10, Some("Rate limit hit".into()), None, 0, 0);
        let providers = collector.rate_limited_requests();
        assert_eq!(providers, vec![LlmProvider::Openrouter]);
    }
}
