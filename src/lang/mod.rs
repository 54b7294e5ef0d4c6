//! Language detection for the five languages the taint analyzer targets.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// One of the five languages the taint analysis engine supports
/// (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Parsed with a real AST (tree-sitter).
    Python,
    /// Analyzed with the three-pass regex strategy.
    JavaScript,
    /// Analyzed with the three-pass regex strategy.
    TypeScript,
    /// Analyzed with the three-pass regex strategy.
    Go,
    /// Analyzed with the three-pass regex strategy.
    Java,
}

impl Language {
    /// Canonical short key, matching the taint-catalog YAML pack naming
    /// (`python/`, `javascript/`, `go/`, `java/`).
    pub fn catalog_key(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "javascript", // TS shares the JS catalog/pack.
            Self::Go => "go",
            Self::Java => "java",
        }
    }

    /// Whether this language uses the AST-based analyzer (only Python) or
    /// the three-pass regex strategy.
    pub fn uses_ast_analysis(self) -> bool {
        matches!(self, Self::Python)
    }
}

/// Detect the language of a file from its extension. Returns `None` for
/// extensions warden-core does not analyze (those files still flow
/// through the pipeline as `CodeFile`s with `language: None`, but the
/// taint analyzer and security frame skip them).
pub fn detect_language(path: &Path) -> Option<Language> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "py" | "pyi" => Some(Language::Python),
        "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
        "ts" | "tsx" | "cts" | "mts" => Some(Language::TypeScript),
        "go" => Some(Language::Go),
        "java" => Some(Language::Java),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn detects_python() {
        assert_eq!(detect_language(&PathBuf::from("app.py")), Some(Language::Python));
    }

    #[test]
    fn detects_js_variants() {
        for ext in ["js", "jsx", "mjs", "cjs"] {
            assert_eq!(
                detect_language(&PathBuf::from(format!("app.{ext}"))),
                Some(Language::JavaScript)
            );
        }
    }

    #[test]
    fn detects_ts_variants() {
        for ext in ["ts", "tsx"] {
            assert_eq!(
                detect_language(&PathBuf::from(format!("app.{ext}"))),
                Some(Language::TypeScript)
            );
        }
    }

    #[test]
    fn unknown_extension_is_none() {
        assert_eq!(detect_language(&PathBuf::from("README")), None);
        assert_eq!(detect_language(&PathBuf::from("image.png")), None);
    }

    #[test]
    fn only_python_uses_ast() {
        assert!(Language::Python.uses_ast_analysis());
        assert!(!Language::JavaScript.uses_ast_analysis());
        assert!(!Language::Go.uses_ast_analysis());
        assert!(!Language::Java.uses_ast_analysis());
    }
}
