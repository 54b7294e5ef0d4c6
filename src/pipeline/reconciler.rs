//! State consistency reconciler (spec.md §4.10): the last step before a
//! `ValidationPipeline` record is handed to the result builder.
//!
//! Grounded on
//! `original_source/.../orchestrator/orchestrator.py`'s
//! `_ensure_state_consistency`, which recomputes the pass/fail counters
//! from current frame results rather than trusting counters accumulated
//! incrementally during the run (frames can flip status during
//! verification/baseline subtraction after they were first counted).

use chrono::Utc;

use crate::core::model::{FrameStatus, PipelineContext, PipelineStatus, ValidationPipeline};

/// Reconcile `pipeline`'s status and counters against `context`'s final
/// `frame_results`, setting `completed_at` and appending a sentinel error
/// if the derived status is `Failed` but nothing explains why.
pub fn reconcile(pipeline: &mut ValidationPipeline, context: &mut PipelineContext) {
    pipeline.completed_at = Some(Utc::now());

    let mut frames_passed = 0usize;
    let mut frames_failed = 0usize;
    let mut has_blocker_failure = false;
    let mut has_non_blocker_failure = false;

    for entry in context.frame_results.values() {
        let Some(result) = &entry.result else { continue };
        match result.status {
            FrameStatus::Passed | FrameStatus::Warning => frames_passed += 1,
            FrameStatus::Failed => {
                frames_failed += 1;
                if result.is_blocker {
                    has_blocker_failure = true;
                } else {
                    has_non_blocker_failure = true;
                }
            }
            FrameStatus::Timeout | FrameStatus::Error => frames_failed += 1,
            FrameStatus::Skipped => {}
        }
    }

    pipeline.frames_passed = frames_passed;
    pipeline.frames_failed = frames_failed;

    pipeline.status = if has_blocker_failure {
        PipelineStatus::Failed
    } else if has_non_blocker_failure || frames_failed > 0 {
        PipelineStatus::CompletedWithFailures
    } else {
        PipelineStatus::Completed
    };

    if pipeline.status == PipelineStatus::Failed && context.errors.is_empty() {
        context.errors.push("pipeline status is FAILED but no explicit error was recorded".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Finding, FrameResult, FrameResultEntry, Severity, VerificationMetadata};
    use crate::lang::Language;
    use std::path::PathBuf;

    fn ctx() -> PipelineContext {
        PipelineContext::new(PathBuf::from("/p"), PathBuf::from("/p/app.py"), "x".into(), Some(Language::Python))
    }

    fn finding() -> Finding {
        Finding {
            id: Finding::new_id("T"),
            severity: Severity::Critical,
            message: "m".into(),
            location: "app.py:1".into(),
            detail: "d".into(),
            code_snippet: String::new(),
            rule_id: "T".into(),
            file_path: PathBuf::from("app.py"),
            is_blocker: true,
            verification_metadata: VerificationMetadata::default(),
            machine_context: None,
        }
    }

    fn seed(context: &mut PipelineContext, status: FrameStatus, is_blocker: bool, findings: Vec<Finding>) {
        let result = FrameResult {
            frame_id: "security".into(),
            frame_name: "Security".into(),
            status,
            duration: std::time::Duration::from_millis(1),
            issues_found: findings.len(),
            is_blocker,
            findings,
            metadata: Default::default(),
        };
        context.frame_results.insert("security".into(), FrameResultEntry { result: Some(result), pre_violations: vec![], post_violations: vec![] });
    }

    #[test]
    fn blocker_failure_yields_failed_status_and_sentinel_error() {
        let mut context = ctx();
        seed(&mut context, FrameStatus::Failed, true, vec![finding()]);
        let mut pipeline = ValidationPipeline::new();
        reconcile(&mut pipeline, &mut context);
        assert_eq!(pipeline.status, PipelineStatus::Failed);
        assert!(!context.errors.is_empty());
        assert!(pipeline.completed_at.is_some());
    }

    #[test]
    fn non_blocker_failure_yields_completed_with_failures() {
        let mut context = ctx();
        seed(&mut context, FrameStatus::Failed, false, vec![]);
        let mut pipeline = ValidationPipeline::new();
        reconcile(&mut pipeline, &mut context);
        assert_eq!(pipeline.status, PipelineStatus::CompletedWithFailures);
    }

    #[test]
    fn no_failures_yields_completed() {
        let mut context = ctx();
        seed(&mut context, FrameStatus::Passed, true, vec![]);
        let mut pipeline = ValidationPipeline::new();
        reconcile(&mut pipeline, &mut context);
        assert_eq!(pipeline.status, PipelineStatus::Completed);
        assert_eq!(pipeline.frames_passed, 1);
        assert_eq!(pipeline.frames_failed, 0);
    }
}
