//! Pattern-check roster for the security frame (spec.md §4.5 step 1).
//!
//! Grounded on `original_source/src/warden/validation/frames/security/`'s
//! check objects (per `_INDEX.md`: `ast_analyzer.py`, `frame.py`,
//! `security_frame.py` reference a pluggable set of narrow rule objects —
//! SQL injection, XSS, hardcoded secrets, hardcoded passwords — each
//! returning its own result so one broken check never stops its siblings).
//! Represented here as `Check` trait objects registered into a
//! `CheckRegistry`, matching the "collapse to a trait object, no
//! inheritance chain" design note in spec.md §9.

mod hardcoded_password;
mod hardcoded_secrets;
mod sql_injection;
mod xss;

use std::sync::Arc;

use tracing::warn;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, Finding};

pub use hardcoded_password::HardcodedPasswordCheck;
pub use hardcoded_secrets::HardcodedSecretsCheck;
pub use sql_injection::SqlInjectionCheck;
pub use xss::XssCheck;

/// One narrow rule's verdict on one file (GLOSSARY "Check").
#[derive(Debug, Clone, Default)]
pub struct CheckResult {
    pub check_id: String,
    pub findings: Vec<Finding>,
}

/// A narrow pattern-based rule within a frame.
pub trait Check: Send + Sync {
    fn check_id(&self) -> &'static str;

    /// Run this check against one file. Checks do not raise for "found
    /// nothing" — only for a genuinely broken check (bad regex compile,
    /// internal panic-worthy state), which `CheckRegistry::run_all`
    /// isolates from its siblings.
    fn run(&self, file: &CodeFile) -> Result<CheckResult>;
}

/// A per-frame registry of pattern checks. External checks can be
/// discovered from a well-known directory by a host adapter and registered
/// programmatically via `register_check`; this crate ships the four
/// reference checks spec.md §4.5 names.
pub struct CheckRegistry {
    checks: Vec<Arc<dyn Check>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// The reference roster: SQL injection, XSS, hardcoded secrets,
    /// hardcoded password.
    pub fn with_default_checks() -> Self {
        let mut registry = Self::new();
        registry.register_check(Arc::new(SqlInjectionCheck));
        registry.register_check(Arc::new(XssCheck));
        registry.register_check(Arc::new(HardcodedSecretsCheck));
        registry.register_check(Arc::new(HardcodedPasswordCheck));
        registry
    }

    pub fn register_check(&mut self, check: Arc<dyn Check>) {
        self.checks.push(check);
    }

    /// Run every registered check against `file`, in registration order
    /// (spec.md §5's "within one frame, check execution is deterministic").
    /// A check that returns `Err` is logged and skipped, never aborting
    /// its siblings.
    pub fn run_all(&self, file: &CodeFile) -> Vec<CheckResult> {
        self.checks
            .iter()
            .filter_map(|check| match check.run(file) {
                Ok(result) => Some(result),
                Err(error) => {
                    warn!(check_id = check.check_id(), %error, "check failed, skipping");
                    None
                }
            })
            .collect()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::with_default_checks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::Language;
    use std::path::PathBuf;

    struct BrokenCheck;
    impl Check for BrokenCheck {
        fn check_id(&self) -> &'static str {
            "broken"
        }
        fn run(&self, _file: &CodeFile) -> Result<CheckResult> {
            Err(crate::core::errors::WardenError::internal("simulated check failure"))
        }
    }

    #[test]
    fn broken_check_does_not_stop_siblings() {
        let mut registry = CheckRegistry::new();
        registry.register_check(Arc::new(BrokenCheck));
        registry.register_check(Arc::new(SqlInjectionCheck));

        let file = CodeFile::new(
            PathBuf::from("app.py"),
            "cursor.execute(\"SELECT * FROM t WHERE id = \" + user_id)",
            Some(Language::Python),
        );
        let results = registry.run_all(&file);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].check_id, "sql-injection-pattern");
    }

    #[test]
    fn default_registry_has_four_checks() {
        let registry = CheckRegistry::with_default_checks();
        let file = CodeFile::new(PathBuf::from("app.py"), "x = 1", Some(Language::Python));
        assert_eq!(registry.run_all(&file).len(), 4);
    }
}
