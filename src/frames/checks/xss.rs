//! Cross-site-scripting pattern check (spec.md §4.5's reference check
//! roster). A lighter-weight sibling of the full taint analyzer's
//! `innerHTML`/`outerHTML` sink tracking (spec.md §4.2): this check flags
//! the assignment shape directly, without requiring a resolved taint path,
//! so unsanitized literal-adjacent assignments still surface even when the
//! source side can't be traced.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, Finding, Severity, VerificationMetadata};
use crate::frames::checks::{Check, CheckResult};

static DOM_SINK_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(innerHTML|outerHTML)\s*=\s*(.+?);?\s*$").unwrap());
static EMPTY_STRING_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^["']\s*["']$"#).unwrap());

static KNOWN_SANITIZERS: &[&str] = &["DOMPurify.sanitize", "sanitizeHtml", "escapeHtml", "he.encode"];

pub struct XssCheck;

impl Check for XssCheck {
    fn check_id(&self) -> &'static str {
        "xss-pattern"
    }

    fn run(&self, file: &CodeFile) -> Result<CheckResult> {
        let mut findings = Vec::new();
        for (index, line) in file.content.lines().enumerate() {
            let Some(captures) = DOM_SINK_ASSIGNMENT.captures(line) else {
                continue;
            };
            let rhs = captures.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
            if rhs.is_empty() || EMPTY_STRING_LITERAL.is_match(rhs) {
                continue;
            }
            let sanitized = KNOWN_SANITIZERS.iter().any(|s| line.contains(s));
            if sanitized {
                continue;
            }
            findings.push(Finding {
                id: Finding::new_id("SEC-XSS"),
                severity: Severity::High,
                message: "Unsanitized assignment to innerHTML/outerHTML".to_string(),
                location: format!("{}:{}", file.path.display(), index + 1),
                detail: "Assigning unsanitized content to innerHTML/outerHTML can execute attacker-controlled markup."
                    .to_string(),
                code_snippet: line.trim().to_string(),
                rule_id: "SEC-XSS".to_string(),
                file_path: file.path.clone(),
                is_blocker: true,
                verification_metadata: VerificationMetadata::default(),
                machine_context: None,
            });
        }
        Ok(CheckResult { check_id: self.check_id().to_string(), findings })
    }
}
