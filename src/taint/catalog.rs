//! Merged source/sink/sanitizer catalog (spec.md §3 `TaintCatalog`, §4.1).
//!
//! Grounded on `taint_analyzer.py`'s catalog access shape
//! (`.sources`/`.sinks`/`.sanitizers`/`.assign_sinks`, all plain dict/list
//! lookups) — no `taint_catalog.py` survives in `original_source/`, only its
//! consumer, so the merge semantics below follow spec.md §4.1 directly:
//! packaged packs load first, the project override is unioned in, and a
//! malformed file is a warning rather than a hard failure.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// The finite sink-type vocabulary (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkType {
    /// SQL statement/parameter value.
    SqlValue,
    /// Shell/subprocess command argument.
    CmdArgument,
    /// HTML response body content.
    HtmlContent,
    /// Dynamic code execution (`eval`, `exec`, `Function`, ...).
    CodeExecution,
    /// Filesystem path value.
    FilePath,
    /// A pack declared a sink type outside the fixed vocabulary. Kept
    /// rather than dropped so a pack author's typo doesn't silently lose
    /// the whole sink entry.
    Unknown,
}

impl SinkType {
    /// Parse a pack's raw sink-type string into the vocabulary.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "SQL-value" => Self::SqlValue,
            "CMD-argument" => Self::CmdArgument,
            "HTML-content" => Self::HtmlContent,
            "CODE-execution" => Self::CodeExecution,
            "FILE-path" => Self::FilePath,
            _ => Self::Unknown,
        }
    }

    /// Render back to the canonical pack string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SqlValue => "SQL-value",
            Self::CmdArgument => "CMD-argument",
            Self::HtmlContent => "HTML-content",
            Self::CodeExecution => "CODE-execution",
            Self::FilePath => "FILE-path",
            Self::Unknown => "Unknown",
        }
    }
}

/// One packaged or project-override language pack (spec.md §6 YAML shape).
#[derive(Debug, Clone, Default, Deserialize)]
struct PackFile {
    #[serde(default)]
    sources: HashMap<String, Vec<String>>,
    #[serde(default)]
    sinks: HashMap<String, String>,
    #[serde(default)]
    sanitizers: HashMap<String, Vec<String>>,
    #[serde(default)]
    assign_sinks: Vec<String>,
}

/// Merged source/sink/sanitizer catalog, built once per scan.
#[derive(Debug, Clone, Default)]
pub struct TaintCatalog {
    /// `language -> source patterns`.
    pub sources: HashMap<String, Vec<String>>,
    /// `sink pattern -> sink type`.
    pub sinks: HashMap<String, SinkType>,
    /// `sink type -> sanitizer patterns`.
    pub sanitizers: HashMap<SinkType, Vec<String>>,
    /// Property-assignment sinks (`innerHTML`, `outerHTML`, ...).
    pub assign_sinks: Vec<String>,
}

/// The packaged, immutable language packs (spec.md §4.1's list).
const PACKAGED_PACKS: &[(&str, &str)] = &[
    ("python/stdlib.yaml", include_str!("packs/python/stdlib.yaml")),
    ("python/flask.yaml", include_str!("packs/python/flask.yaml")),
    ("python/fastapi.yaml", include_str!("packs/python/fastapi.yaml")),
    ("python/django.yaml", include_str!("packs/python/django.yaml")),
    ("javascript/express.yaml", include_str!("packs/javascript/express.yaml")),
    ("javascript/koa.yaml", include_str!("packs/javascript/koa.yaml")),
    ("javascript/browser.yaml", include_str!("packs/javascript/browser.yaml")),
    ("go/stdlib.yaml", include_str!("packs/go/stdlib.yaml")),
    ("java/servlet.yaml", include_str!("packs/java/servlet.yaml")),
    ("java/spring.yaml", include_str!("packs/java/spring.yaml")),
];

/// Hardcoded fallback sources/sinks used when every packaged pack fails to
/// parse (spec.md §4.1 "Failure" clause): analysis still proceeds.
fn fallback_catalog() -> TaintCatalog {
    let mut catalog = TaintCatalog::default();
    catalog
        .sources
        .insert("python".into(), vec!["request.args".into(), "request.form".into(), "input".into()]);
    catalog
        .sources
        .insert("javascript".into(), vec!["req.query".into(), "req.body".into(), "location.hash".into()]);
    catalog.sinks.insert("cursor.execute".into(), SinkType::SqlValue);
    catalog.sinks.insert("eval".into(), SinkType::CodeExecution);
    catalog.assign_sinks.push("innerHTML".into());
    catalog
}

impl TaintCatalog {
    /// Load every packaged pack, then union-merge the project's
    /// `.warden/taint_catalog.yaml` override if present. Never fails: a
    /// missing file or parse error is logged and skipped, with sibling
    /// files still loading (spec.md §4.1 "Failure").
    pub fn load(project_root: &Path) -> Self {
        let mut catalog = Self::default();
        let mut loaded_any = false;
        for (name, content) in PACKAGED_PACKS {
            match serde_yaml::from_str::<PackFile>(content) {
                Ok(pack) => {
                    catalog.merge(pack);
                    loaded_any = true;
                }
                Err(error) => warn!(pack = name, %error, "malformed packaged taint pack, skipped"),
            }
        }

        if !loaded_any {
            warn!("no packaged taint packs loaded, falling back to hardcoded catalog");
            catalog = fallback_catalog();
        }

        let override_path = project_root.join(".warden").join("taint_catalog.yaml");
        if override_path.exists() {
            match fs::read_to_string(&override_path) {
                Ok(content) => match serde_yaml::from_str::<PackFile>(&content) {
                    Ok(pack) => catalog.merge(pack),
                    Err(error) => warn!(
                        path = %override_path.display(),
                        %error,
                        "malformed taint catalog override, skipped"
                    ),
                },
                Err(error) => warn!(
                    path = %override_path.display(),
                    %error,
                    "failed to read taint catalog override"
                ),
            }
        }

        catalog
    }

    /// Union-merge one pack's entries into `self`. User/project entries
    /// never remove packaged entries (spec.md §4.1).
    fn merge(&mut self, pack: PackFile) {
        for (language, patterns) in pack.sources {
            let entry = self.sources.entry(language).or_default();
            for pattern in patterns {
                if !entry.contains(&pattern) {
                    entry.push(pattern);
                }
            }
        }
        for (pattern, sink_type) in pack.sinks {
            self.sinks.entry(pattern).or_insert_with(|| SinkType::parse(&sink_type));
        }
        for (sink_type, patterns) in pack.sanitizers {
            let sink_type = SinkType::parse(&sink_type);
            let entry = self.sanitizers.entry(sink_type).or_default();
            for pattern in patterns {
                if !entry.contains(&pattern) {
                    entry.push(pattern);
                }
            }
        }
        for sink in pack.assign_sinks {
            if !self.assign_sinks.contains(&sink) {
                self.assign_sinks.push(sink);
            }
        }
    }

    /// Whether `name` matches a known source pattern for `language`.
    pub fn is_source(&self, language: &str, name: &str) -> bool {
        self.sources
            .get(language)
            .map(|patterns| patterns.iter().any(|pattern| name.contains(pattern.as_str())))
            .unwrap_or(false)
    }

    /// The sink type for `name`, if it matches a known sink pattern.
    /// Longest-pattern-first so `cursor.executemany` doesn't shadow a more
    /// specific override with the same prefix.
    pub fn sink_type_for(&self, name: &str) -> Option<SinkType> {
        self.sinks
            .iter()
            .filter(|(pattern, _)| name.contains(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, sink_type)| *sink_type)
    }

    /// Whether `sanitizer_call` neutralises `sink_type`.
    pub fn is_sanitizer(&self, sink_type: SinkType, sanitizer_call: &str) -> bool {
        self.sanitizers
            .get(&sink_type)
            .map(|patterns| patterns.iter().any(|pattern| sanitizer_call.contains(pattern.as_str())))
            .unwrap_or(false)
    }

    /// Whether `property` is a property-assignment sink (`x.innerHTML = ...`).
    pub fn is_assign_sink(&self, property: &str) -> bool {
        self.assign_sinks.iter().any(|p| p == property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn packaged_packs_all_parse() {
        let catalog = TaintCatalog::load(&PathBuf::from("/nonexistent"));
        assert!(catalog.sources.contains_key("python"));
        assert!(catalog.sources.contains_key("javascript"));
        assert!(catalog.sources.contains_key("go"));
        assert!(catalog.sources.contains_key("java"));
    }

    #[test]
    fn flask_source_detected() {
        let catalog = TaintCatalog::load(&PathBuf::from("/nonexistent"));
        assert!(catalog.is_source("python", "request.args.get(\"q\")"));
    }

    #[test]
    fn sink_type_lookup() {
        let catalog = TaintCatalog::load(&PathBuf::from("/nonexistent"));
        assert_eq!(catalog.sink_type_for("cursor.execute(query)"), Some(SinkType::SqlValue));
        assert_eq!(catalog.sink_type_for("child_process.exec(cmd)"), Some(SinkType::CmdArgument));
    }

    #[test]
    fn sanitizer_lookup() {
        let catalog = TaintCatalog::load(&PathBuf::from("/nonexistent"));
        assert!(catalog.is_sanitizer(SinkType::HtmlContent, "DOMPurify.sanitize(h)"));
        assert!(!catalog.is_sanitizer(SinkType::HtmlContent, "some_other_call(h)"));
    }

    #[test]
    fn assign_sinks_present() {
        let catalog = TaintCatalog::load(&PathBuf::from("/nonexistent"));
        assert!(catalog.is_assign_sink("innerHTML"));
        assert!(!catalog.is_assign_sink("textContent"));
    }

    #[test]
    fn project_override_unions_with_packaged() {
        let dir = tempfile::tempdir().unwrap();
        let warden_dir = dir.path().join(".warden");
        fs::create_dir_all(&warden_dir).unwrap();
        fs::write(
            warden_dir.join("taint_catalog.yaml"),
            "sources:\n  python:\n    - \"custom.untrusted\"\nsinks: {}\nsanitizers: {}\nassign_sinks: []\n",
        )
        .unwrap();

        let catalog = TaintCatalog::load(dir.path());
        assert!(catalog.is_source("python", "custom.untrusted"));
        assert!(catalog.is_source("python", "request.args"));
    }
}
