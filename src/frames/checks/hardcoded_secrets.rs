//! Hardcoded-secrets pattern check (spec.md §4.5's reference check roster):
//! API keys, tokens, and other high-entropy credential-shaped literals
//! assigned directly in source.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, Finding, Severity, VerificationMetadata};
use crate::frames::checks::{Check, CheckResult};

static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#"(?i)(api[_-]?key|secret[_-]?key|access[_-]?token|auth[_-]?token)\s*[:=]\s*["'][A-Za-z0-9_\-]{16,}["']"#).unwrap(),
        Regex::new(r#"(?i)sk-[A-Za-z0-9]{20,}"#).unwrap(),
        Regex::new(r#"(?i)AKIA[0-9A-Z]{16}"#).unwrap(),
    ]
});

pub struct HardcodedSecretsCheck;

impl Check for HardcodedSecretsCheck {
    fn check_id(&self) -> &'static str {
        "hardcoded-secrets"
    }

    fn run(&self, file: &CodeFile) -> Result<CheckResult> {
        let mut findings = Vec::new();
        for (index, line) in file.content.lines().enumerate() {
            if SECRET_PATTERNS.iter().any(|pattern| pattern.is_match(line)) {
                findings.push(Finding {
                    id: Finding::new_id("SEC-SECRET"),
                    severity: Severity::Critical,
                    message: "Hardcoded credential literal detected".to_string(),
                    location: format!("{}:{}", file.path.display(), index + 1),
                    detail: "A secret-shaped literal appears directly in source; move it to an environment variable or secret store."
                        .to_string(),
                    code_snippet: redact(line),
                    rule_id: "SEC-SECRET".to_string(),
                    file_path: file.path.clone(),
                    is_blocker: true,
                    verification_metadata: VerificationMetadata::default(),
                    machine_context: None,
                });
            }
        }
        Ok(CheckResult { check_id: self.check_id().to_string(), findings })
    }
}

/// Never echo the literal secret value back into a finding's snippet.
fn redact(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.len() > 40 {
        format!("{}...<redacted>", &trimmed[..20.min(trimmed.len())])
    } else {
        "<redacted: matches secret pattern>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn flags_hardcoded_api_key() {
        let file = CodeFile::new(PathBuf::from("config.py"), "api_key = \"sk-ABCDEFGHIJ1234567890abcd\"", None);
        let result = HardcodedSecretsCheck.run(&file).unwrap();
        assert_eq!(result.findings.len(), 1);
        assert!(!result.findings[0].code_snippet.contains("ABCDEFGHIJ1234567890abcd"));
    }

    #[test]
    fn env_var_reference_not_flagged() {
        let file = CodeFile::new(PathBuf::from("config.py"), "api_key = os.environ[\"API_KEY\"]", None);
        let result = HardcodedSecretsCheck.run(&file).unwrap();
        assert!(result.findings.is_empty());
    }
}
