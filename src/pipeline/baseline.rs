//! Baseline subtraction (spec.md §4.9): drops findings already known and
//! accepted in `.warden/baseline.json`, flipping a frame's status back to
//! `passed` when the drop empties its finding list.
//!
//! Grounded on `original_source/.../orchestrator/orchestrator.py`'s
//! `_apply_baseline`, which builds the same `(rule_id, normalized_path)`
//! key set and filters in place. A corrupted baseline file degrades to a
//! warning (spec.md §4.9's explicit "not a crash" requirement) rather than
//! `WardenError::Baseline` propagating out of the phase loop.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::model::{FrameStatus, PipelineContext};

#[derive(Debug, Deserialize)]
struct BaselineFile {
    #[serde(default)]
    frame_results: Vec<BaselineFrameResult>,
}

#[derive(Debug, Deserialize)]
struct BaselineFrameResult {
    #[serde(default)]
    findings: Vec<BaselineFinding>,
}

#[derive(Debug, Deserialize)]
struct BaselineFinding {
    rule_id: String,
    file_path: String,
}

/// Normalize a finding's path to be relative to `project_root`. Absolute
/// paths outside the root, and paths that otherwise fail to resolve, fall
/// back to their original string rather than erroring — an unresolvable
/// path simply never matches a baseline key.
fn normalize_path(path: &Path, project_root: &Path) -> String {
    path.strip_prefix(project_root)
        .map(|relative| relative.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.to_string_lossy().into_owned())
}

fn baseline_key(rule_id: &str, path: &str) -> (String, String) {
    (rule_id.to_string(), path.to_string())
}

/// Load and apply `.warden/baseline.json`, dropping matched findings from
/// `context.findings` and every `frame_results` entry, flipping a frame's
/// status to `passed` if it drops to zero findings. Returns without
/// touching `context` if no baseline file exists.
pub fn apply(context: &mut PipelineContext) {
    let baseline_path = context.project_root.join(".warden").join("baseline.json");
    if !baseline_path.exists() {
        return;
    }

    let raw = match std::fs::read_to_string(&baseline_path) {
        Ok(raw) => raw,
        Err(error) => {
            context.warnings.push(format!("could not read baseline file {}: {error}", baseline_path.display()));
            return;
        }
    };

    let parsed: BaselineFile = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(error) => {
            context.warnings.push(format!("baseline file {} is corrupted: {error}", baseline_path.display()));
            return;
        }
    };

    let known: HashSet<(String, String)> = parsed
        .frame_results
        .into_iter()
        .flat_map(|fr| fr.findings)
        .map(|f| baseline_key(&f.rule_id, &f.file_path))
        .collect();

    apply_known_keys(context, &known);
}

fn apply_known_keys(context: &mut PipelineContext, known: &HashSet<(String, String)>) {
    let project_root = context.project_root.clone();
    for entry in context.frame_results.values_mut() {
        let Some(result) = entry.result.as_mut() else { continue };
        result.findings.retain(|finding| {
            let normalized = normalize_path(&finding.file_path, &project_root);
            !known.contains(&baseline_key(&finding.rule_id, &normalized))
        });
        result.issues_found = result.findings.len();
        if result.findings.is_empty() && result.status == FrameStatus::Failed {
            result.status = FrameStatus::Passed;
        }
    }
    context.reaggregate_findings();
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

    fn finding(rule_id: &str, path: &str) -> Finding {
        Finding {
            id: Finding::new_id(rule_id),
            severity: Severity::High,
            message: "m".into(),
            location: format!("{path}:1"),
            detail: "d".into(),
            code_snippet: String::new(),
            rule_id: rule_id.to_string(),
            file_path: PathBuf::from(path),
            is_blocker: true,
            verification_metadata: VerificationMetadata::default(),
            machine_context: None,
        }
    }

    fn seed(context: &mut PipelineContext, findings: Vec<Finding>, status: FrameStatus) {
        let result = FrameResult {
            frame_id: "security".into(),
            frame_name: "Security".into(),
            status,
            duration: std::time::Duration::from_millis(1),
            issues_found: findings.len(),
            is_blocker: true,
            findings,
            metadata: Default::default(),
        };
        context.frame_results.insert("security".into(), FrameResultEntry { result: Some(result), pre_violations: vec![], post_violations: vec![] });
        context.reaggregate_findings();
    }

    #[test]
    fn matching_finding_is_dropped_and_status_flips_to_passed() {
        let mut context = ctx();
        seed(&mut context, vec![finding("SEC-001", "app.py")], FrameStatus::Failed);
        let known: HashSet<(String, String)> = [baseline_key("SEC-001", "app.py")].into_iter().collect();
        apply_known_keys(&mut context, &known);
        let entry = context.frame_results.get("security").unwrap();
        assert!(entry.result.as_ref().unwrap().findings.is_empty());
        assert_eq!(entry.result.as_ref().unwrap().status, FrameStatus::Passed);
        assert!(context.findings.is_empty());
    }

    #[test]
    fn non_matching_finding_survives() {
        let mut context = ctx();
        seed(&mut context, vec![finding("SEC-002", "app.py")], FrameStatus::Failed);
        let known: HashSet<(String, String)> = [baseline_key("SEC-001", "app.py")].into_iter().collect();
        apply_known_keys(&mut context, &known);
        assert_eq!(context.findings.len(), 1);
    }

    #[test]
    fn missing_baseline_file_is_a_silent_noop() {
        let mut context = ctx();
        seed(&mut context, vec![finding("SEC-001", "app.py")], FrameStatus::Failed);
        apply(&mut context);
        assert_eq!(context.findings.len(), 1);
    }

    #[test]
    fn normalize_path_falls_back_to_original_when_unrelated() {
        let normalized = normalize_path(&PathBuf::from("/other/app.py"), &PathBuf::from("/p"));
        assert_eq!(normalized, "/other/app.py");
    }
}
