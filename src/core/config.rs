//! Host-facing configuration contract.
//!
//! Loading `.warden/config.yaml` from disk, merging CLI overrides, and
//! secret management are outer-scope collaborator concerns (spec.md §1);
//! this module defines the *shape* such a loader hands to the core, plus
//! the handful of environment variables the core itself is allowed to
//! read (spec.md §6).

use std::collections::HashMap;
use std::env;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::errors::Result;

/// Analysis-level override, forcibly disabling LLM-assisted phases when
/// `BASIC` (spec.md §4.7 "Basic-level overrides").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnalysisLevel {
    /// Pattern/AST/taint only; no LLM calls at all.
    Basic,
    /// Full pipeline, LLM-assisted phases enabled per their own flags.
    Standard,
    /// Standard plus more aggressive LLM usage (e.g. lower fast-tier
    /// confidence threshold before falling back to smart tier).
    Deep,
}

impl Default for AnalysisLevel {
    fn default() -> Self {
        Self::Standard
    }
}

/// Taint-analysis confidence model (spec.md §4.1). Every field is a
/// probability in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TaintConfig {
    /// Source confidence when a catalog entry matches directly.
    pub source_catalog_confidence: f64,
    /// Base source confidence via signal inference (no catalog match).
    pub source_inference_base: f64,
    /// Additional confidence per corroborating hint during inference.
    pub source_inference_per_hint: f64,
    /// Ceiling for inferred source confidence.
    pub source_inference_cap: f64,
    /// Base sink confidence.
    pub sink_base: f64,
    /// Confidence after propagation through an assignment.
    pub sink_propagation_confidence: f64,
    /// Multiplicative penalty applied when a sanitizer wraps the argument.
    pub sanitizer_penalty: f64,
    /// Confidence at or above which a taint path is promoted to a blocker.
    pub confidence_threshold: f64,
}

impl Default for TaintConfig {
    fn default() -> Self {
        Self {
            source_catalog_confidence: 0.9,
            source_inference_base: 0.65,
            source_inference_per_hint: 0.10,
            source_inference_cap: 0.90,
            sink_base: 0.60,
            sink_propagation_confidence: 0.75,
            sanitizer_penalty: 0.3,
            confidence_threshold: 0.8,
        }
    }
}

/// Clamp every numeric field into `[0.0, 1.0]`, logging a warning for any
/// value that had to be clamped. Grounded on
/// `taint_analyzer.py::validate_taint_config`: unrecognised keys are
/// dropped (handled naturally by `serde(default)` ignoring unknown keys
/// unless `deny_unknown_fields` is set, which this struct intentionally
/// does not set), and missing keys are filled from defaults (handled by
/// `#[serde(default)]`).
pub fn validate_taint_config(mut config: TaintConfig) -> TaintConfig {
    macro_rules! clamp_field {
        ($field:ident) => {
            let clamped = config.$field.clamp(0.0, 1.0);
            if (clamped - config.$field).abs() > f64::EPSILON {
                warn!(
                    field = stringify!($field),
                    original = config.$field,
                    clamped,
                    "taint config value out of [0.0, 1.0], clamped"
                );
                config.$field = clamped;
            }
        };
    }
    clamp_field!(source_catalog_confidence);
    clamp_field!(source_inference_base);
    clamp_field!(source_inference_per_hint);
    clamp_field!(source_inference_cap);
    clamp_field!(sink_base);
    clamp_field!(sink_propagation_confidence);
    clamp_field!(sanitizer_penalty);
    clamp_field!(confidence_threshold);
    config
}

/// Per-frame execution strategy (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStrategy {
    /// One frame at a time, in priority order.
    Sequential,
    /// Bounded-concurrency fan-out (`parallel_limit` at a time).
    Parallel,
    /// Sequential, stop after the first blocker+critical finding.
    FailFast,
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        Self::Parallel
    }
}

/// Frame-execution tuning knobs (spec.md §4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameExecutionConfig {
    /// Execution strategy across selected frames.
    pub strategy: ExecutionStrategy,
    /// Max concurrent frames under the `Parallel` strategy.
    pub parallel_limit: usize,
    /// Whether files classified as TEST/EXAMPLE/DOCUMENTATION are included.
    pub include_test_files: bool,
    /// Dynamic-timeout bytes-per-second divisor.
    pub bytes_per_second: u64,
    /// Dynamic-timeout floor, in seconds, for cloud providers.
    pub min_timeout_secs: u64,
    /// Dynamic-timeout floor, in seconds, for local providers (Ollama,
    /// Claude Code, Codex), which can exceed cloud timings on CPU prefill.
    pub min_timeout_local_secs: u64,
    /// Dynamic-timeout ceiling, in seconds.
    pub max_timeout_secs: u64,
}

impl Default for FrameExecutionConfig {
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::default(),
            parallel_limit: 3,
            include_test_files: false,
            bytes_per_second: 10_000,
            min_timeout_secs: 5,
            min_timeout_local_secs: 60,
            max_timeout_secs: 300,
        }
    }
}

/// Per-provider LLM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider identifier (matches `llm::types::LlmProvider`).
    pub provider: String,
    /// Model name to request.
    pub model: String,
    /// API base URL override, if not the provider default.
    pub base_url: Option<String>,
}

/// Top-level LLM configuration block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Smart-tier provider (fallback of record).
    pub smart: ProviderConfig,
    /// Fast-tier providers, raced with a first-completed-wins pattern.
    pub fast: Vec<ProviderConfig>,
    /// Total-deadline timeout per provider call, in seconds.
    pub timeout_secs: u64,
    /// Fast-tier race ceiling, in seconds.
    pub fast_tier_race_ceiling_secs: u64,
    /// Whether phases are permitted to use the LLM at all.
    pub use_llm: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            smart: ProviderConfig {
                provider: "anthropic".into(),
                model: "claude-sonnet".into(),
                base_url: None,
            },
            fast: Vec::new(),
            timeout_secs: 60,
            fast_tier_race_ceiling_secs: 10,
            use_llm: true,
        }
    }
}

/// Per-phase enable flags (spec.md §4.7's "Condition to run" column).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Pre-analysis phase.
    pub enable_pre_analysis: bool,
    /// Analysis phase.
    pub enable_analysis: bool,
    /// Validation phase.
    pub enable_validation: bool,
    /// Verification (false-positive filtering) phase.
    pub enable_issue_validation: bool,
    /// Fortification (fix-suggestion) phase.
    pub enable_fortification: bool,
    /// Cleaning (refactoring-suggestion) phase.
    pub enable_cleaning: bool,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            enable_pre_analysis: true,
            enable_analysis: true,
            enable_validation: true,
            enable_issue_validation: true,
            enable_fortification: true,
            enable_cleaning: true,
        }
    }
}

/// The full configuration contract a host passes into the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Analysis level; `Basic` forces the overrides in spec.md §4.7.
    pub analysis_level: AnalysisLevel,
    /// Taint-analysis confidence model.
    pub taint: TaintConfig,
    /// Frame-execution tuning.
    pub frame_execution: FrameExecutionConfig,
    /// LLM provider configuration.
    pub llm: LlmConfig,
    /// Per-phase enable flags.
    pub phases: PhaseConfig,
    /// Overall pipeline deadline, in seconds (spec.md §5).
    pub pipeline_timeout_secs: u64,
    /// If true, bypass the findings cache on both lookup and store.
    pub force_scan: bool,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            analysis_level: AnalysisLevel::default(),
            taint: TaintConfig::default(),
            frame_execution: FrameExecutionConfig::default(),
            llm: LlmConfig::default(),
            phases: PhaseConfig::default(),
            pipeline_timeout_secs: 300,
            force_scan: false,
        }
    }
}

impl WardenConfig {
    /// Parse a `.warden/config.yaml`-shaped document. The host owns
    /// locating and reading the file; this just validates the shape.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.taint = validate_taint_config(config.taint);
        Ok(config)
    }

    /// Apply the spec.md §4.7 "Basic-level overrides": when
    /// `analysis_level == BASIC`, force `use_llm=false`,
    /// `enable_fortification=false`, `enable_cleaning=false`,
    /// `enable_issue_validation=false` before any phase runs.
    pub fn apply_basic_level_overrides(&mut self) {
        if self.analysis_level == AnalysisLevel::Basic {
            self.llm.use_llm = false;
            self.phases.enable_fortification = false;
            self.phases.enable_cleaning = false;
            self.phases.enable_issue_validation = false;
        }
    }

    /// Apply the narrow, explicit `WARDEN_*` environment-variable
    /// overrides from spec.md §6. This is the only place the core reads
    /// environment state.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(provider) = env::var("WARDEN_LLM_PROVIDER") {
            self.llm.smart.provider = provider;
        }
        if let Ok(blocked) = env::var("WARDEN_BLOCKED_PROVIDERS") {
            let blocked: Vec<String> = blocked.split(',').map(|s| s.trim().to_string()).collect();
            self.llm.fast.retain(|p| !blocked.contains(&p.provider));
            if blocked.contains(&self.llm.smart.provider) {
                warn!(provider = %self.llm.smart.provider, "smart provider is in WARDEN_BLOCKED_PROVIDERS");
            }
        }
        if let Ok(priority) = env::var("WARDEN_FAST_TIER_PRIORITY") {
            let order: Vec<String> = priority.split(',').map(|s| s.trim().to_string()).collect();
            self.llm.fast.sort_by_key(|p| {
                order
                    .iter()
                    .position(|name| name == &p.provider)
                    .unwrap_or(usize::MAX)
            });
        }
        if let Ok(min) = env::var("WARDEN_FILE_TIMEOUT_MIN") {
            if let Ok(secs) = min.parse::<u64>() {
                self.frame_execution.min_timeout_secs = secs;
            }
        }
        if let Ok(model) = env::var("WARDEN_SMART_MODEL") {
            self.llm.smart.model = model;
        }
        if let Ok(model) = env::var("WARDEN_FAST_MODEL") {
            for fast in &mut self.llm.fast {
                fast.model = model.clone();
            }
        }
    }
}

/// `true` when `WARDEN_NON_INTERACTIVE` is set; respected by every phase
/// that would otherwise prompt (none do today, but the flag is load-bearing
/// for host adapters built on top of this crate).
pub fn non_interactive() -> bool {
    env::var("WARDEN_NON_INTERACTIVE").is_ok()
}

/// Provider credential lookup: `provider -> env var name`. A missing
/// credential silently disables that provider rather than erroring
/// (spec.md §6).
pub fn provider_credential_env_vars() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("openai", "OPENAI_API_KEY"),
        ("anthropic", "ANTHROPIC_API_KEY"),
        ("azure", "AZURE_OPENAI_API_KEY"),
        ("groq", "GROQ_API_KEY"),
        ("openrouter", "OPENROUTER_API_KEY"),
        ("deepseek", "DEEPSEEK_API_KEY"),
        ("qwen_code", "QWEN_API_KEY"),
        ("gemini", "GEMINI_API_KEY"),
        ("ollama", "OLLAMA_HOST"),
    ])
}

/// Whether a provider has the credential it needs present in the
/// environment.
pub fn provider_credential_present(provider: &str) -> bool {
    provider_credential_env_vars()
        .get(provider)
        .map(|var| env::var(var).is_ok())
        .unwrap_or(true) // offline/CLI-subprocess providers need no env credential
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_taint_config_is_already_valid() {
        let config = TaintConfig::default();
        let validated = validate_taint_config(config);
        assert!((validated.confidence_threshold - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_confidence_threshold_is_clamped() {
        let mut config = TaintConfig::default();
        config.confidence_threshold = 2.0;
        let validated = validate_taint_config(config);
        assert!((validated.confidence_threshold - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_is_idempotent() {
        let config = TaintConfig {
            confidence_threshold: 5.0,
            sanitizer_penalty: -1.0,
            ..TaintConfig::default()
        };
        let once = validate_taint_config(config);
        let twice = validate_taint_config(once);
        assert!((once.confidence_threshold - twice.confidence_threshold).abs() < f64::EPSILON);
        assert!((once.sanitizer_penalty - twice.sanitizer_penalty).abs() < f64::EPSILON);
    }

    #[test]
    fn basic_level_forces_overrides() {
        let mut config = WardenConfig {
            analysis_level: AnalysisLevel::Basic,
            ..WardenConfig::default()
        };
        config.apply_basic_level_overrides();
        assert!(!config.llm.use_llm);
        assert!(!config.phases.enable_fortification);
        assert!(!config.phases.enable_cleaning);
        assert!(!config.phases.enable_issue_validation);
    }

    #[test]
    #[serial]
    fn env_override_blocked_providers() {
        env::set_var("WARDEN_BLOCKED_PROVIDERS", "groq,openrouter");
        let mut config = WardenConfig::default();
        config.llm.fast = vec![
            ProviderConfig { provider: "groq".into(), model: "m".into(), base_url: None },
            ProviderConfig { provider: "gemini".into(), model: "m".into(), base_url: None },
        ];
        config.apply_env_overrides();
        assert_eq!(config.llm.fast.len(), 1);
        assert_eq!(config.llm.fast[0].provider, "gemini");
        env::remove_var("WARDEN_BLOCKED_PROVIDERS");
    }

    #[test]
    fn from_yaml_parses_minimal_document() {
        let config = WardenConfig::from_yaml("analysis_level: BASIC\n").unwrap();
        assert_eq!(config.analysis_level, AnalysisLevel::Basic);
    }
}
