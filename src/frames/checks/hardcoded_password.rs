//! Hardcoded-password pattern check (spec.md §4.5's reference check
//! roster). Distinct from `hardcoded-secrets`: this targets
//! `password`/`passwd`/`pwd`-named assignments specifically, which tend to
//! show up in connection strings and test fixtures rather than the
//! API-token shape the secrets check covers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, Finding, Severity, VerificationMetadata};
use crate::frames::checks::{Check, CheckResult};

static PASSWORD_ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b(password|passwd|pwd)\s*[:=]\s*["']([^"']{4,})["']"#).unwrap());

/// Placeholder values too common to be worth reporting (fixtures, docs,
/// templated config).
static PLACEHOLDER_VALUES: &[&str] =
    &["changeme", "your_password", "your-password", "placeholder", "xxxxxxxx", "password", "<password>"];

pub struct HardcodedPasswordCheck;

impl Check for HardcodedPasswordCheck {
    fn check_id(&self) -> &'static str {
        "hardcoded-password"
    }

    fn run(&self, file: &CodeFile) -> Result<CheckResult> {
        let mut findings = Vec::new();
        for (index, line) in file.content.lines().enumerate() {
            let Some(captures) = PASSWORD_ASSIGNMENT.captures(line) else {
                continue;
            };
            let value = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
            if PLACEHOLDER_VALUES.iter().any(|placeholder| value.eq_ignore_ascii_case(placeholder)) {
                continue;
            }
            findings.push(Finding {
                id: Finding::new_id("SEC-PASSWORD"),
                severity: Severity::High,
                message: "Hardcoded password literal detected".to_string(),
                location: format!("{}:{}", file.path.display(), index + 1),
                detail: "A password value is embedded directly in source; use a secret store or environment variable."
                    .to_string(),
                code_snippet: "<redacted: password literal>".to_string(),
                rule_id: "SEC-PASSWORD".to_string(),
                file_path: file.path.clone(),
                is_blocker: false,
                verification_metadata: VerificationMetadata::default(),
                machine_context: None,
            });
        }
        Ok(CheckResult { check_id: self.check_id().to_string(), findings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn flags_hardcoded_password() {
        let file = CodeFile::new(PathBuf::from("settings.py"), "password = \"hunter2!!\"", None);
        let result = HardcodedPasswordCheck.run(&file).unwrap();
        assert_eq!(result.findings.len(), 1);
    }

    #[test]
    fn placeholder_value_not_flagged() {
        let file = CodeFile::new(PathBuf::from("settings.py.template"), "password = \"changeme\"", None);
        let result = HardcodedPasswordCheck.run(&file).unwrap();
        assert!(result.findings.is_empty());
    }
}
