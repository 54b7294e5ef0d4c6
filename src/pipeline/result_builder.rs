//! Result builder (spec.md §4.11): produces the immutable `ScanResult` DTO
//! a host consumes, plus the `(ambient)` `ScanOutcome` classification
//! SPEC_FULL.md §6 adds so a CLI adapter can map to an exit code without
//! re-deriving pipeline-status logic.
//!
//! Grounded on
//! `original_source/.../orchestrator/orchestrator.py`'s result-assembly
//! tail end, which counts findings by severity, counts
//! `review_required` separately from blockers, and folds execution
//! metadata (strategy, scan id, frame summary) into one dict before
//! returning. A flat results DTO with a `metadata` map, returned from one
//! analysis entry point, is the idiom this mirrors.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::ExecutionStrategy;
use crate::core::model::{Finding, FrameResult, PipelineContext, PipelineStatus, Severity, ValidationPipeline};

/// The exit-code-adjacent classification a CLI adapter maps to 0/1/2
/// (SPEC_FULL.md §6's "ambient exit-code exposure").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// No findings survived, no blocker, no error.
    Clean,
    /// Non-blocker failures occurred but nothing forces policy failure.
    CompletedWithFailures,
    /// At least one blocker finding survived to the result.
    PolicyFailure,
    /// The pipeline itself failed (timeout, fatal error).
    InternalError,
}

/// Immutable scan result DTO (spec.md §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: String,
    pub file_path: std::path::PathBuf,
    pub status: PipelineStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub findings: Vec<Finding>,
    /// Keyed by `Severity`'s lowercase wire name (`"critical"`, `"high"`,
    /// ...) rather than the enum itself — a `HashMap` with an enum key
    /// does not round-trip through `serde_json`.
    pub severity_counts: HashMap<String, usize>,
    pub manual_review_count: usize,
    pub quality_score: Option<f64>,
    pub frame_results: Vec<FrameResult>,
    pub total_tokens: u64,
    pub metadata: ScanMetadata,
}

/// Free-form execution metadata surfaced alongside the findings
/// (spec.md §4.11's "execution strategy, scan id, advisories,
/// frame-execution summary, artifacts list").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub execution_strategy: Option<ExecutionStrategy>,
    pub advisories: Vec<String>,
    pub frame_execution_summary: HashMap<String, String>,
    pub artifacts: Vec<String>,
}

impl ScanResult {
    /// Classify this result for a CLI-level exit code without requiring
    /// callers to re-derive pipeline-status/blocker logic themselves.
    pub fn outcome(&self) -> ScanOutcome {
        if self.status == PipelineStatus::Failed && self.findings.iter().all(|f| !f.is_blocker) {
            return ScanOutcome::InternalError;
        }
        if self.findings.iter().any(|f| f.is_blocker) {
            return ScanOutcome::PolicyFailure;
        }
        match self.status {
            PipelineStatus::CompletedWithFailures => ScanOutcome::CompletedWithFailures,
            PipelineStatus::Failed => ScanOutcome::InternalError,
            PipelineStatus::Completed | PipelineStatus::Running => ScanOutcome::Clean,
        }
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

fn severity_counts(findings: &[Finding]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for finding in findings {
        *counts.entry(severity_label(finding.severity).to_string()).or_insert(0) += 1;
    }
    counts
}

/// Apply the quality-score rule (spec.md §4.11): a present, non-zero
/// `quality_score_before` is the base; `0.0`/`None` derive from the
/// Cleaning-phase score instead, since `0.0` is only ever a legitimate
/// Analysis-phase value, never a "did not run" sentinel by itself when a
/// later phase has a more current number.
fn resolve_quality_score(context: &PipelineContext) -> Option<f64> {
    match context.quality_score_before {
        Some(before) if before != 0.0 => Some(context.quality_score_after.unwrap_or(before)),
        _ => context.quality_score_after.or(context.quality_score_before),
    }
}

/// Build the final `ScanResult` from a fully reconciled context and
/// pipeline record. Called after `reconciler::reconcile`.
pub fn build(pipeline: &ValidationPipeline, context: &PipelineContext, strategy: ExecutionStrategy) -> ScanResult {
    let frame_results: Vec<FrameResult> = context.frame_results.values().filter_map(|entry| entry.result.clone()).collect();

    let mut frame_execution_summary = HashMap::new();
    for result in &frame_results {
        frame_execution_summary.insert(result.frame_id.clone(), format!("{:?}", result.status));
    }

    let manual_review_count = context.findings.iter().filter(|f| f.verification_metadata.review_required).count();

    ScanResult {
        scan_id: pipeline.id.clone(),
        file_path: context.file_path.clone(),
        status: pipeline.status,
        started_at: pipeline.started_at,
        completed_at: pipeline.completed_at,
        severity_counts: severity_counts(&context.findings),
        manual_review_count,
        quality_score: resolve_quality_score(context),
        frame_results,
        total_tokens: context.total_tokens,
        findings: context.findings.clone(),
        metadata: ScanMetadata {
            execution_strategy: Some(strategy),
            advisories: context.warnings.clone(),
            frame_execution_summary,
            artifacts: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{FrameResultEntry, FrameStatus, VerificationMetadata};
    use crate::lang::Language;
    use std::path::PathBuf;

    fn ctx() -> PipelineContext {
        PipelineContext::new(PathBuf::from("/p"), PathBuf::from("/p/app.py"), "x".into(), Some(Language::Python))
    }

    fn finding(severity: Severity, is_blocker: bool) -> Finding {
        Finding {
            id: Finding::new_id("T"),
            severity,
            message: "m".into(),
            location: "app.py:1".into(),
            detail: "d".into(),
            code_snippet: String::new(),
            rule_id: "T".into(),
            file_path: PathBuf::from("app.py"),
            is_blocker,
            verification_metadata: VerificationMetadata::default(),
            machine_context: None,
        }
    }

    #[test]
    fn quality_score_of_five_is_not_treated_as_missing() {
        let mut context = ctx();
        context.quality_score_before = Some(5.0);
        assert_eq!(resolve_quality_score(&context), Some(5.0));
    }

    #[test]
    fn zero_before_falls_back_to_after() {
        let mut context = ctx();
        context.quality_score_before = Some(0.0);
        context.quality_score_after = Some(7.0);
        assert_eq!(resolve_quality_score(&context), Some(7.0));
    }

    #[test]
    fn clean_result_has_clean_outcome() {
        let context = ctx();
        let pipeline = ValidationPipeline::new();
        let result = build(&pipeline, &context, ExecutionStrategy::Sequential);
        assert_eq!(result.outcome(), ScanOutcome::Clean);
    }

    #[test]
    fn blocker_finding_yields_policy_failure_outcome() {
        let mut context = ctx();
        let entry = FrameResultEntry {
            result: Some(FrameResult {
                frame_id: "security".into(),
                frame_name: "Security".into(),
                status: FrameStatus::Failed,
                duration: std::time::Duration::from_millis(1),
                issues_found: 1,
                is_blocker: true,
                findings: vec![finding(Severity::Critical, true)],
                metadata: Default::default(),
            }),
            pre_violations: vec![],
            post_violations: vec![],
        };
        context.frame_results.insert("security".into(), entry);
        context.reaggregate_findings();
        let mut pipeline = ValidationPipeline::new();
        pipeline.status = PipelineStatus::Failed;
        let result = build(&pipeline, &context, ExecutionStrategy::Sequential);
        assert_eq!(result.outcome(), ScanOutcome::PolicyFailure);
        assert_eq!(result.severity_counts.get("critical"), Some(&1));
    }

    #[test]
    fn pipeline_failure_with_no_blockers_is_internal_error() {
        let context = ctx();
        let mut pipeline = ValidationPipeline::new();
        pipeline.status = PipelineStatus::Failed;
        let result = build(&pipeline, &context, ExecutionStrategy::Sequential);
        assert_eq!(result.outcome(), ScanOutcome::InternalError);
    }
}
