//! Fortification phase (spec.md §4.7 row 7 / §9): an extension point.
//! spec.md §9 notes this phase's contract is "stubbed in the source and
//! not fully specified"; this implementation exposes the documented
//! output shape (`fortifications[]`, `applied_fixes[]`) driven by a small
//! table of known-fixable finding patterns, rather than inventing a
//! broader auto-fix engine the spec does not describe.
//!
//! Grounded on the rule-id vocabulary `frames::security::frame`/
//! `taint::catalog` already define (`SEC-TAINT`, pattern-check rule ids
//! from `frames::checks`); each table entry names a rule id and the fix
//! guidance to surface, mirroring how `llm_verify`'s findings carry a
//! fixed `rule_id` consumers can match on.

use async_trait::async_trait;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, PipelineContext};

/// `(rule id substring, human-facing fix suggestion)`. Matched against
/// each surviving finding's `rule_id`; a finding can match more than one
/// entry.
const KNOWN_FIXES: &[(&str, &str)] = &[
    ("SEC-TAINT", "Use a parameterized query or prepared statement instead of concatenating the tainted value into the command."),
    ("SQL", "Use a parameterized query or prepared statement instead of string-built SQL."),
    ("COMMAND", "Avoid shelling out with untrusted input; use an argv-array API instead of a shell string."),
    ("DESERIAL", "Switch to a safe deserializer (e.g. JSON) instead of one that can execute arbitrary code."),
];

pub struct FortificationPhase;

#[async_trait]
impl super::Phase for FortificationPhase {
    fn name(&self) -> &'static str {
        "FORTIFICATION"
    }

    async fn execute(&self, context: &mut PipelineContext, _file: &CodeFile) -> Result<()> {
        for finding in &context.findings {
            for (pattern, suggestion) in KNOWN_FIXES {
                if finding.rule_id.contains(pattern) {
                    context.fortifications.push(format!("{}: {}", finding.location, suggestion));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::Phase;
    use super::*;
    use crate::core::model::{Finding, FrameResult, FrameResultEntry, FrameStatus, Severity, VerificationMetadata};
    use crate::lang::Language;
    use std::path::PathBuf;

    fn ctx() -> PipelineContext {
        PipelineContext::new(PathBuf::from("/p"), PathBuf::from("/p/app.py"), "x".into(), Some(Language::Python))
    }

    fn finding(rule_id: &str) -> Finding {
        Finding {
            id: Finding::new_id(rule_id),
            severity: Severity::High,
            message: "m".into(),
            location: "app.py:1".into(),
            detail: "d".into(),
            code_snippet: String::new(),
            rule_id: rule_id.to_string(),
            file_path: PathBuf::from("app.py"),
            is_blocker: false,
            verification_metadata: VerificationMetadata::default(),
            machine_context: None,
        }
    }

    #[tokio::test]
    async fn known_pattern_yields_fix_suggestion() {
        let mut context = ctx();
        let result = FrameResult {
            frame_id: "security".into(),
            frame_name: "Security".into(),
            status: FrameStatus::Warning,
            duration: std::time::Duration::from_millis(1),
            issues_found: 1,
            is_blocker: true,
            findings: vec![finding("SEC-TAINT")],
            metadata: Default::default(),
        };
        context.frame_results.insert("security".into(), FrameResultEntry { result: Some(result), pre_violations: vec![], post_violations: vec![] });
        context.reaggregate_findings();

        let file = CodeFile::new(PathBuf::from("/p/app.py"), "x = 1", Some(Language::Python));
        FortificationPhase.execute(&mut context, &file).await.unwrap();
        assert_eq!(context.fortifications.len(), 1);
    }

    #[tokio::test]
    async fn no_findings_yields_no_fortifications() {
        let mut context = ctx();
        let file = CodeFile::new(PathBuf::from("/p/app.py"), "x = 1", Some(Language::Python));
        FortificationPhase.execute(&mut context, &file).await.unwrap();
        assert!(context.fortifications.is_empty());
    }
}
