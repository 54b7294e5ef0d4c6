//! Heuristic source/sink signal inference — the fallback tier used when no
//! catalog pattern matches (spec.md §4.1).
//!
//! Grounded on `taint_analyzer.py`'s call sites
//! (`self._signal_engine.infer_source(func_name, module_hint)`,
//! `.infer_sink(func_name, param_names, module_hint)`); the underlying
//! `signal_inference.py`/`model_loader.py` were not present in
//! `original_source/` (imported lazily inside a try/except there), so the
//! confidence arithmetic below follows spec.md §4.1's confidence model
//! directly via [`crate::core::config::TaintConfig`].

use crate::core::config::TaintConfig;
use crate::taint::catalog::SinkType;

/// Name fragments that heuristically indicate untrusted input, independent
/// of any specific framework's catalog entries.
const SOURCE_NAME_HINTS: &[&str] = &[
    "request", "input", "param", "query", "body", "form", "cookie", "header", "argv", "stdin", "env",
];

/// Name fragments that heuristically indicate a dangerous sink.
const SINK_NAME_HINTS: &[(&str, SinkType)] = &[
    ("execute", SinkType::SqlValue),
    ("query", SinkType::SqlValue),
    ("exec", SinkType::CmdArgument),
    ("spawn", SinkType::CmdArgument),
    ("system", SinkType::CmdArgument),
    ("eval", SinkType::CodeExecution),
    ("render", SinkType::HtmlContent),
    ("write", SinkType::HtmlContent),
    ("open", SinkType::FilePath),
];

/// Heuristic source/sink classifier, parameterized by the confidence model
/// so `.warden/config.yaml` overrides flow through without a second
/// implementation.
#[derive(Debug, Clone, Copy)]
pub struct SignalInference {
    config: TaintConfig,
}

impl SignalInference {
    /// Build an inference engine bound to a validated confidence model.
    pub fn new(config: TaintConfig) -> Self {
        Self { config }
    }

    /// Infer whether `name` is a source, optionally corroborated by
    /// `module_hint` (e.g. the enclosing call's module/receiver). Returns
    /// `(role, confidence)`; confidence starts at `source_inference_base`
    /// and gains `source_inference_per_hint` per corroborating hint, capped
    /// at `source_inference_cap`.
    pub fn infer_source(&self, name: &str, module_hint: Option<&str>) -> Option<(String, f64)> {
        let lower = name.to_ascii_lowercase();
        let name_hits = SOURCE_NAME_HINTS.iter().filter(|hint| lower.contains(*hint)).count();
        if name_hits == 0 {
            return None;
        }

        let module_hits = module_hint
            .map(|hint| {
                let hint = hint.to_ascii_lowercase();
                SOURCE_NAME_HINTS.iter().filter(|h| hint.contains(*h)).count()
            })
            .unwrap_or(0);

        let hints = name_hits + module_hits;
        let confidence = (self.config.source_inference_base
            + self.config.source_inference_per_hint * (hints.saturating_sub(1)) as f64)
            .min(self.config.source_inference_cap);

        Some(("user input".to_string(), confidence))
    }

    /// Infer whether `name` is a sink, optionally corroborated by
    /// `param_names` (the call's argument names, checked for
    /// source-like names) and `module_hint`.
    pub fn infer_sink(&self, name: &str, param_names: &[&str], module_hint: Option<&str>) -> Option<(SinkType, f64)> {
        let lower = name.to_ascii_lowercase();
        let sink_type = SINK_NAME_HINTS.iter().find(|(hint, _)| lower.contains(hint)).map(|(_, t)| *t)?;

        let param_hits = param_names
            .iter()
            .filter(|p| SOURCE_NAME_HINTS.iter().any(|hint| p.to_ascii_lowercase().contains(hint)))
            .count();
        let module_hits = module_hint
            .map(|hint| {
                let hint = hint.to_ascii_lowercase();
                SOURCE_NAME_HINTS.iter().filter(|h| hint.contains(*h)).count()
            })
            .unwrap_or(0);

        let confidence = if param_hits + module_hits > 0 {
            self.config.sink_propagation_confidence
        } else {
            self.config.sink_base
        };

        Some((sink_type, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_request_as_source() {
        let engine = SignalInference::new(TaintConfig::default());
        let (role, confidence) = engine.infer_source("get_request_param", None).unwrap();
        assert_eq!(role, "user input");
        assert!(confidence >= 0.65 && confidence <= 0.90);
    }

    #[test]
    fn non_source_name_returns_none() {
        let engine = SignalInference::new(TaintConfig::default());
        assert!(engine.infer_source("calculate_total", None).is_none());
    }

    #[test]
    fn infers_execute_as_sql_sink() {
        let engine = SignalInference::new(TaintConfig::default());
        let (sink_type, confidence) = engine.infer_sink("run_execute", &[], None).unwrap();
        assert_eq!(sink_type, SinkType::SqlValue);
        assert!((confidence - 0.60).abs() < f64::EPSILON);
    }

    #[test]
    fn sink_confidence_bumps_with_tainted_param() {
        let engine = SignalInference::new(TaintConfig::default());
        let (_, confidence) = engine.infer_sink("run_execute", &["request_data"], None).unwrap();
        assert!((confidence - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn confidence_caps_at_configured_ceiling() {
        let engine = SignalInference::new(TaintConfig::default());
        let (_, confidence) = engine.infer_source("request_input_param_query_body", Some("request_module")).unwrap();
        assert!(confidence <= 0.90);
    }
}
