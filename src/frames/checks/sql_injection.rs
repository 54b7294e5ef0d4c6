//! SQL injection pattern check (spec.md §4.5's reference check roster).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, Finding, Severity, VerificationMetadata};
use crate::frames::checks::{Check, CheckResult};

static SQL_CONCAT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // cursor.execute("..." + var) / db.query("..." + var)
        Regex::new(r#"(?i)(execute|query|raw)\s*\(\s*["'][^"']*["']\s*\+"#).unwrap(),
        // f-strings / format() with SQL keywords directly embedded
        Regex::new(r#"(?i)(execute|query|raw)\s*\(\s*f["'][^"']*\{[^}]+\}"#).unwrap(),
        // old-style `%` string formatting applied directly to a SQL literal
        Regex::new(r#"(?i)["'](SELECT|INSERT|UPDATE|DELETE)\b[^"']*["']\s*%\s*"#).unwrap(),
    ]
});

pub struct SqlInjectionCheck;

impl Check for SqlInjectionCheck {
    fn check_id(&self) -> &'static str {
        "sql-injection-pattern"
    }

    fn run(&self, file: &CodeFile) -> Result<CheckResult> {
        let mut findings = Vec::new();
        for (index, line) in file.content.lines().enumerate() {
            if SQL_CONCAT_PATTERNS.iter().any(|pattern| pattern.is_match(line)) {
                findings.push(Finding {
                    id: Finding::new_id("SEC-SQLI"),
                    severity: Severity::High,
                    message: "Possible SQL injection via string concatenation/interpolation".to_string(),
                    location: format!("{}:{}", file.path.display(), index + 1),
                    detail: "Query text appears to be built from untrusted input instead of a parameterized query."
                        .to_string(),
                    code_snippet: line.trim().to_string(),
                    rule_id: "SEC-SQLI".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn flags_string_concatenation_into_execute() {
        let file = CodeFile::new(
            PathBuf::from("app.py"),
            "cursor.execute(\"SELECT * FROM t WHERE name = \" + q)",
            None,
        );
        let result = SqlInjectionCheck.run(&file).unwrap();
        assert_eq!(result.findings.len(), 1);
        assert!(result.findings[0].is_blocker);
    }

    #[test]
    fn clean_parameterized_query_not_flagged() {
        let file = CodeFile::new(
            PathBuf::from("app.py"),
            "cursor.execute(\"SELECT * FROM t WHERE name = %s\", (name,))",
            None,
        );
        let result = SqlInjectionCheck.run(&file).unwrap();
        assert!(result.findings.is_empty());
    }
}
