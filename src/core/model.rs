//! Core data model shared across every phase and frame.
//!
//! These types mirror `spec.md` §3 exactly: `CodeFile` is an immutable
//! per-file handle, `PipelineContext` is the single piece of mutable state
//! threaded through the pipeline, and `Finding`/`FrameResult` are the
//! output vocabulary every frame and phase writes into.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lang::Language;

/// One of PRODUCTION / TEST / EXAMPLE / DOCUMENTATION; governs whether a
/// file is validated (spec Glossary: "Context (file)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileContext {
    /// Ordinary production source.
    Production,
    /// Test code — excluded from validation unless `include_test_files`.
    Test,
    /// Example/sample code, shipped for documentation purposes.
    Example,
    /// Prose documentation with embedded code fences.
    Documentation,
}

impl Default for FileContext {
    fn default() -> Self {
        Self::Production
    }
}

/// An immutable handle to one source file, created once per scan.
#[derive(Debug, Clone)]
pub struct CodeFile {
    /// Absolute or project-relative path, as given to the scan.
    pub path: PathBuf,
    /// Full file content, read once at scan start.
    pub content: Arc<str>,
    /// Detected language, if any.
    pub language: Option<Language>,
    /// Scan-time hints: triage lane, inferred file context, etc.
    pub metadata: CodeFileMetadata,
}

/// Mutable scan-time hints attached to a `CodeFile`. Distinct from the
/// immutable file body so the pre-analysis and triage phases can populate
/// it without touching `content`.
#[derive(Debug, Clone, Default)]
pub struct CodeFileMetadata {
    /// Inferred file context (PRODUCTION/TEST/EXAMPLE/DOCUMENTATION).
    pub file_context: FileContext,
    /// Triage lane set by the Triage phase, directing per-file LLM tier.
    pub triage_lane: Option<String>,
}

impl CodeFile {
    /// Construct a new code file handle with default (un-triaged) metadata.
    pub fn new(path: impl Into<PathBuf>, content: impl Into<Arc<str>>, language: Option<Language>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            language,
            metadata: CodeFileMetadata::default(),
        }
    }

    /// Byte length of the file content, used for dynamic timeout sizing.
    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Severity levels a `Finding` can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Low-impact finding.
    Low,
    /// Worth fixing but not pipeline-blocking by itself.
    Medium,
    /// High-impact; sets `FrameResult.status = warning` if not already failed.
    High,
    /// Pipeline-blocking by definition.
    Critical,
}

/// Taint-flow evidence attached to a `Finding`, when it originates from a
/// `TaintPath` rather than a pattern/LLM check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineContext {
    /// The tainted source expression/name.
    pub source: String,
    /// The sink expression/name the tainted value reached.
    pub sink: String,
    /// Ordered list of intermediate transformations/variables.
    pub data_flow_path: Vec<String>,
}

/// Verification metadata attached after the LLM false-positive pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationMetadata {
    /// True if a human should look at this finding even though it was not
    /// rejected outright; never counted as a blocker regardless of severity.
    pub review_required: bool,
    /// Free-form rationale from the verifier, if any.
    pub rationale: Option<String>,
}

/// The unit of output: one concrete security (or other-frame) issue found
/// in one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Stable identifier that survives serialization round-trips.
    pub id: String,
    /// Severity bucket.
    pub severity: Severity,
    /// Short human-readable summary.
    pub message: String,
    /// `path:line[:col]` location string.
    pub location: String,
    /// Longer explanation / remediation guidance.
    pub detail: String,
    /// The offending source snippet, verbatim (never HTML-escaped at this
    /// layer — consumers choose their own escaping).
    pub code_snippet: String,
    /// The rule/check identifier that produced this finding.
    pub rule_id: String,
    /// File path the finding belongs to.
    pub file_path: PathBuf,
    /// Whether this finding, if present, forces pipeline status `FAILED`.
    pub is_blocker: bool,
    /// Post-verification metadata.
    pub verification_metadata: VerificationMetadata,
    /// Taint-flow evidence, when applicable.
    pub machine_context: Option<MachineContext>,
}

impl Finding {
    /// Generate a fresh, stable finding id: a short namespaced-uuid
    /// identifier.
    pub fn new_id(rule_id: &str) -> String {
        format!("{rule_id}-{}", Uuid::new_v4())
    }
}

/// One frame's verdict on one file (or, for `BatchExecutable` frames, on
/// the whole batch it was given).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    /// No issue reached the failing threshold.
    Passed,
    /// At least one `high` severity finding, no blocker.
    Warning,
    /// A blocker finding, or a `critical` finding.
    Failed,
    /// The frame's per-file deadline elapsed.
    Timeout,
    /// The frame raised an unrecoverable error.
    Error,
    /// Zero files were given to this frame (or it was gated by a pre-rule).
    Skipped,
}

/// One frame's verdict, attached into `PipelineContext.frame_results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameResult {
    /// Frame identifier (stable, machine-facing).
    pub frame_id: String,
    /// Frame display name.
    pub frame_name: String,
    /// Outcome status.
    pub status: FrameStatus,
    /// Wall-clock execution time.
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// `findings.len()`; invariant-checked equal to `findings.len()`.
    pub issues_found: usize,
    /// Whether this frame's configuration marks it as blocker-capable.
    pub is_blocker: bool,
    /// The findings this frame produced.
    pub findings: Vec<Finding>,
    /// Free-form frame metadata (e.g. check-level breakdown).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl FrameResult {
    /// Derive the status rule from spec §4.5: `failed` if any finding is an
    /// explicit blocker or `critical`; `warning` if any `high`; `passed`
    /// otherwise.
    pub fn status_from_findings(findings: &[Finding]) -> FrameStatus {
        if findings.is_empty() {
            return FrameStatus::Passed;
        }
        if findings
            .iter()
            .any(|f| f.is_blocker || f.severity == Severity::Critical)
        {
            return FrameStatus::Failed;
        }
        if findings.iter().any(|f| f.severity == Severity::High) {
            return FrameStatus::Warning;
        }
        FrameStatus::Passed
    }

    /// Check the `issues_found == findings.len()` invariant.
    pub fn check_invariant(&self) -> bool {
        self.issues_found == self.findings.len()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
        d.as_secs_f64().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

/// One `(frame_id, path)` pre/post rule-gate verdict.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameResultEntry {
    /// The frame's own result, or `None` if a pre-rule gate skipped it.
    pub result: Option<FrameResult>,
    /// Blocker violations raised by pre-rules, before the frame ran.
    pub pre_violations: Vec<Finding>,
    /// Blocker violations raised by post-rules, after the frame ran.
    pub post_violations: Vec<Finding>,
}

/// Per-file type inference plus any triage-phase hints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileAnalysisContext {
    /// Inferred context classification.
    pub file_context: FileContext,
    /// Triage lane, if the Triage phase ran.
    pub triage_lane: Option<String>,
}

/// Entry points, auth patterns, and sink/source hints discovered during
/// pre-analysis, consumed by Classification and the security frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectIntelligence {
    /// File-level entry points inferred from filenames/route decorators.
    pub entry_points: Vec<String>,
    /// Authentication/authorization pattern hints.
    pub auth_patterns: Vec<String>,
    /// Untrusted-input source hints discovered project-wide.
    pub input_sources: Vec<String>,
    /// Sensitive sink hints discovered project-wide.
    pub critical_sinks: Vec<String>,
}

/// Quality metrics populated by the Analysis phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Free-form metric name -> value map (hotspot scores, debt hours, etc).
    pub values: HashMap<String, f64>,
    /// File-level hotspots.
    pub hotspots: Vec<String>,
    /// Cheap, high-value improvement candidates.
    pub quick_wins: Vec<String>,
    /// Estimated technical-debt hours.
    pub technical_debt_hours: f64,
}

/// A suppression rule loaded from `.warden/suppression.yaml`, applied when
/// re-aggregating findings at the end of the Validation phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionRule {
    /// Rule id this suppression applies to, or `None` for "any rule".
    pub rule_id: Option<String>,
    /// Glob pattern for files this suppression applies to.
    pub file_glob: Option<String>,
}

/// The shared mutable state threaded through every pipeline phase.
///
/// Created once per scan, owned by the orchestrator, extended in place by
/// each phase. Never aliased across threads except through the explicit
/// per-frame synchronization the frame executor provides.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Unique id for this pipeline run.
    pub pipeline_id: String,
    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,
    /// The single file path this context is scoped to (one context per
    /// scanned file; cross-file frames receive a slice of contexts).
    pub file_path: PathBuf,
    /// Project root, used to resolve relative paths (baseline, catalogs).
    pub project_root: PathBuf,
    /// Detected language for `file_path`.
    pub language: Option<Language>,
    /// The file's source text.
    pub source_code: Arc<str>,
    /// Cached parsed AST, if the pre-analysis phase populated it.
    pub ast_cache: Option<Arc<tree_sitter::Tree>>,
    /// Project-wide intelligence gathered during pre-analysis.
    pub project_intelligence: ProjectIntelligence,
    /// Per-file analysis context (keyed by path string for cross-file use).
    pub file_contexts: HashMap<PathBuf, FileAnalysisContext>,
    /// Aggregated findings: the union of every frame result's findings
    /// after verification (spec §3 invariant).
    pub findings: Vec<Finding>,
    /// Per-frame results, keyed by frame id.
    pub frame_results: HashMap<String, FrameResultEntry>,
    /// `None` = classification did not run; `Some(vec![])` = it ran and
    /// selected nothing. These are deliberately distinct (spec §3).
    pub selected_frames: Option<Vec<String>>,
    /// Active suppression rules (from `.warden/suppression.yaml`).
    pub suppression_rules: Vec<SuppressionRule>,
    /// Per-frame priority override decided by Classification, highest
    /// first (lower number = runs earlier under `SEQUENTIAL`).
    pub frame_priorities: HashMap<String, u32>,
    /// Human-readable rationale for the Classification phase's frame
    /// selection, surfaced in the result builder's metadata.
    pub classification_reasoning: Option<String>,
    /// Quality metrics from the Analysis phase.
    pub quality_metrics: QualityMetrics,
    /// Quality score before Cleaning; `None` until Analysis runs.
    pub quality_score_before: Option<f64>,
    /// Quality score after Cleaning; `None` until Cleaning runs.
    pub quality_score_after: Option<f64>,
    /// Fortification-phase output: human-readable fix suggestions.
    pub fortifications: Vec<String>,
    /// Fortification-phase output: fixes actually applied in-place.
    pub applied_fixes: Vec<String>,
    /// Cleaning-phase output: human-readable refactoring suggestions.
    pub cleaning_suggestions: Vec<String>,
    /// Cleaning-phase output: refactorings actually applied.
    pub refactorings: Vec<String>,
    /// Non-fatal errors accumulated across phases.
    pub errors: Vec<String>,
    /// Non-fatal warnings accumulated across phases (precondition
    /// failures, fallback frame selection, malformed-but-skipped packs).
    pub warnings: Vec<String>,
    /// Total LLM tokens consumed by this scan.
    pub total_tokens: u64,
    /// Prompt-side token count.
    pub prompt_tokens: u64,
    /// Completion-side token count.
    pub completion_tokens: u64,
    /// Number of LLM requests issued.
    pub request_count: u64,
}

impl PipelineContext {
    /// Start a fresh context for one file.
    pub fn new(project_root: PathBuf, file_path: PathBuf, source_code: Arc<str>, language: Option<Language>) -> Self {
        Self {
            pipeline_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            file_path,
            project_root,
            language,
            source_code,
            ast_cache: None,
            project_intelligence: ProjectIntelligence::default(),
            file_contexts: HashMap::new(),
            findings: Vec::new(),
            frame_results: HashMap::new(),
            selected_frames: None,
            suppression_rules: Vec::new(),
            frame_priorities: HashMap::new(),
            classification_reasoning: None,
            quality_metrics: QualityMetrics::default(),
            quality_score_before: None,
            quality_score_after: None,
            fortifications: Vec::new(),
            applied_fixes: Vec::new(),
            cleaning_suggestions: Vec::new(),
            refactorings: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            total_tokens: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            request_count: 0,
        }
    }

    /// Record LLM usage from a completed request/response pair.
    pub fn record_llm_usage(&mut self, prompt_tokens: u64, completion_tokens: u64) {
        self.prompt_tokens += prompt_tokens;
        self.completion_tokens += completion_tokens;
        self.total_tokens += prompt_tokens + completion_tokens;
        self.request_count += 1;
    }

    /// Recompute `findings` as the union of every frame result's findings.
    /// Applies active suppression rules, dropping matches.
    pub fn reaggregate_findings(&mut self) {
        let mut findings = Vec::new();
        for entry in self.frame_results.values() {
            if let Some(result) = &entry.result {
                findings.extend(result.findings.iter().cloned());
            }
        }
        findings.retain(|f| !self.is_suppressed(f));
        self.findings = findings;
    }

    fn is_suppressed(&self, finding: &Finding) -> bool {
        self.suppression_rules.iter().any(|rule| {
            let rule_matches = rule
                .rule_id
                .as_ref()
                .map(|id| id == &finding.rule_id)
                .unwrap_or(true);
            let glob_matches = rule
                .file_glob
                .as_ref()
                .map(|pattern| {
                    glob::Pattern::new(pattern)
                        .map(|p| p.matches_path(&finding.file_path))
                        .unwrap_or(false)
                })
                .unwrap_or(true);
            rule_matches && glob_matches
        })
    }
}

/// Overall pipeline status, reconciled at the end of a scan (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Still executing.
    Running,
    /// No failed frames.
    Completed,
    /// At least one failed frame, but none was a blocker.
    CompletedWithFailures,
    /// At least one failed frame was a blocker, or a fatal/timeout error.
    Failed,
}

/// A tracking record for one validation run across a set of frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationPipeline {
    /// Unique id.
    pub id: String,
    /// Current status.
    pub status: PipelineStatus,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Completion time, set once the reconciler runs.
    pub completed_at: Option<DateTime<Utc>>,
    /// Number of frames that were executed (attempted).
    pub frames_executed: usize,
    /// Number of frames whose status was `Passed`/`Warning`.
    pub frames_passed: usize,
    /// Number of frames whose status was `Failed`/`Timeout`/`Error`.
    pub frames_failed: usize,
}

impl ValidationPipeline {
    /// Start a new tracking record.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: PipelineStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            frames_executed: 0,
            frames_passed: 0,
            frames_failed: 0,
        }
    }
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity, is_blocker: bool) -> Finding {
        Finding {
            id: Finding::new_id("TEST-001"),
            severity,
            message: "test finding".into(),
            location: "app.py:1".into(),
            detail: "detail".into(),
            code_snippet: "x = 1".into(),
            rule_id: "TEST-001".into(),
            file_path: PathBuf::from("app.py"),
            is_blocker,
            verification_metadata: VerificationMetadata::default(),
            machine_context: None,
        }
    }

    #[test]
    fn status_rule_blocker_wins() {
        let findings = vec![finding(Severity::Medium, true)];
        assert_eq!(FrameResult::status_from_findings(&findings), FrameStatus::Failed);
    }

    #[test]
    fn status_rule_critical_is_failed() {
        let findings = vec![finding(Severity::Critical, false)];
        assert_eq!(FrameResult::status_from_findings(&findings), FrameStatus::Failed);
    }

    #[test]
    fn status_rule_high_is_warning() {
        let findings = vec![finding(Severity::High, false)];
        assert_eq!(FrameResult::status_from_findings(&findings), FrameStatus::Warning);
    }

    #[test]
    fn status_rule_medium_is_passed() {
        let findings = vec![finding(Severity::Medium, false)];
        assert_eq!(FrameResult::status_from_findings(&findings), FrameStatus::Passed);
    }

    #[test]
    fn status_rule_empty_is_passed() {
        assert_eq!(FrameResult::status_from_findings(&[]), FrameStatus::Passed);
    }

    #[test]
    fn selected_frames_none_vs_empty_are_distinct() {
        let mut ctx = PipelineContext::new(PathBuf::from("/p"), PathBuf::from("/p/app.py"), "x".into(), None);
        assert!(ctx.selected_frames.is_none());
        ctx.selected_frames = Some(vec![]);
        assert_eq!(ctx.selected_frames, Some(vec![]));
    }

    #[test]
    fn reaggregate_applies_suppression() {
        let mut ctx = PipelineContext::new(PathBuf::from("/p"), PathBuf::from("/p/app.py"), "x".into(), None);
        let f = finding(Severity::High, false);
        ctx.frame_results.insert(
            "security".into(),
            FrameResultEntry {
                result: Some(FrameResult {
                    frame_id: "security".into(),
                    frame_name: "Security".into(),
                    status: FrameStatus::Warning,
                    duration: Duration::from_secs(1),
                    issues_found: 1,
                    is_blocker: false,
                    findings: vec![f],
                    metadata: HashMap::new(),
                }),
                pre_violations: vec![],
                post_violations: vec![],
            },
        );
        ctx.suppression_rules.push(SuppressionRule {
            rule_id: Some("TEST-001".into()),
            file_glob: None,
        });
        ctx.reaggregate_findings();
        assert!(ctx.findings.is_empty());
    }
}
