//! Pre-analysis phase (spec.md §4.7 row 1): project intelligence and
//! per-file context inference.
//!
//! Grounded on
//! `original_source/.../pipeline/application/phase_orchestrator.py`'s
//! `_execute_pre_analysis_async`, which stores a `project_context` and
//! `file_contexts` map built by a dedicated `PreAnalysisPhase`. That phase
//! itself is not in the retrieval pack, so the entry-point/auth-pattern/
//! input-source heuristics below are written directly from spec.md §4.7's
//! field list ("entry points from filenames + route/auth decorators;
//! auth_patterns; input sources; critical sinks") using the same
//! regex-heuristic idiom `taint::signals::SignalInference` applies to
//! source/sink detection.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use tree_sitter::Parser;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, FileAnalysisContext, FileContext, PipelineContext};
use crate::lang::Language;
use crate::pipeline::phases::Phase;

const ENTRY_POINT_FILENAMES: &[&str] = &["main", "app", "server", "index", "wsgi", "asgi", "manage"];

static ROUTE_DECORATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)@app\.route|@router\.(get|post|put|delete|patch)|app\.(get|post|put|delete)\(|router\.(get|post|put|delete)\(|@(Get|Post|Put|Delete)Mapping").unwrap()
});

static AUTH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)login_required|@authenticate|jwt|session\[|passport\.|is_authenticated|require_auth|@PreAuthorize").unwrap()
});

static INPUT_SOURCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)request\.(args|form|json|params|body|query)|req\.(params|query|body)|sys\.argv|os\.environ").unwrap());

static CRITICAL_SINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.execute\(|\.query\(|subprocess\.|os\.system|eval\(|exec\(|pickle\.loads").unwrap());

/// Classify a file's production/test/example/documentation role from its
/// path alone (spec.md §4.6 "Filtering").
pub fn infer_file_context(file: &CodeFile) -> FileContext {
    let path = file.path.to_string_lossy().to_ascii_lowercase();
    if path.contains("/test") || path.contains("test_") || path.ends_with("_test.go") || path.contains("/spec") || path.contains("__tests__") {
        return FileContext::Test;
    }
    if path.contains("/example") || path.contains("/demo") || path.contains("/sample") {
        return FileContext::Example;
    }
    if path.ends_with(".md") || path.ends_with(".rst") || path.contains("/docs/") {
        return FileContext::Documentation;
    }
    FileContext::Production
}

fn is_entry_point_filename(file: &CodeFile) -> bool {
    file.path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| ENTRY_POINT_FILENAMES.iter().any(|candidate| stem.eq_ignore_ascii_case(candidate)))
        .unwrap_or(false)
}

pub struct PreAnalysisPhase;

#[async_trait]
impl Phase for PreAnalysisPhase {
    fn name(&self) -> &'static str {
        "PRE-ANALYSIS"
    }

    async fn execute(&self, context: &mut PipelineContext, file: &CodeFile) -> Result<()> {
        let file_context = infer_file_context(file);
        context.file_contexts.insert(
            file.path.clone(),
            FileAnalysisContext { file_context, triage_lane: None },
        );

        let path_display = file.path.display().to_string();
        if is_entry_point_filename(file) || ROUTE_DECORATOR.is_match(&file.content) {
            context.project_intelligence.entry_points.push(path_display.clone());
        }
        if AUTH_PATTERN.is_match(&file.content) {
            context.project_intelligence.auth_patterns.push(path_display.clone());
        }
        for capture in INPUT_SOURCE.find_iter(&file.content) {
            context.project_intelligence.input_sources.push(capture.as_str().to_string());
        }
        for capture in CRITICAL_SINK.find_iter(&file.content) {
            context.project_intelligence.critical_sinks.push(capture.as_str().to_string());
        }

        if file.language == Some(Language::Python) {
            let mut parser = Parser::new();
            if parser.set_language(&tree_sitter_python::LANGUAGE.into()).is_ok() {
                if let Some(tree) = parser.parse(file.content.as_bytes(), None) {
                    context.ast_cache = Some(Arc::new(tree));
                }
            }
        }

        debug!(
            phase = self.name(),
            file = %path_display,
            file_context = ?file_context,
            "pre-analysis complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx() -> PipelineContext {
        PipelineContext::new(PathBuf::from("/p"), PathBuf::from("/p/app.py"), "x".into(), Some(Language::Python))
    }

    #[tokio::test]
    async fn flags_entry_point_filename() {
        let mut context = ctx();
        let file = CodeFile::new(PathBuf::from("app.py"), "print(1)", Some(Language::Python));
        PreAnalysisPhase.execute(&mut context, &file).await.unwrap();
        assert_eq!(context.project_intelligence.entry_points.len(), 1);
    }

    #[tokio::test]
    async fn flags_route_decorator_as_entry_point() {
        let mut context = ctx();
        let file = CodeFile::new(
            PathBuf::from("views.py"),
            "@app.route(\"/login\")\ndef login():\n    pass\n",
            Some(Language::Python),
        );
        PreAnalysisPhase.execute(&mut context, &file).await.unwrap();
        assert_eq!(context.project_intelligence.entry_points.len(), 1);
        assert_eq!(context.project_intelligence.auth_patterns.len(), 0);
    }

    #[tokio::test]
    async fn flags_input_sources_and_sinks() {
        let mut context = ctx();
        let file = CodeFile::new(
            PathBuf::from("views.py"),
            "q = request.args.get(\"q\")\ncursor.execute(q)\n",
            Some(Language::Python),
        );
        PreAnalysisPhase.execute(&mut context, &file).await.unwrap();
        assert!(!context.project_intelligence.input_sources.is_empty());
        assert!(!context.project_intelligence.critical_sinks.is_empty());
    }

    #[tokio::test]
    async fn test_file_context_inferred() {
        let mut context = ctx();
        let file = CodeFile::new(PathBuf::from("tests/test_views.py"), "x = 1", Some(Language::Python));
        PreAnalysisPhase.execute(&mut context, &file).await.unwrap();
        assert_eq!(context.file_contexts[&file.path].file_context, FileContext::Test);
    }

    #[tokio::test]
    async fn populates_ast_cache_for_python() {
        let mut context = ctx();
        let file = CodeFile::new(PathBuf::from("app.py"), "x = 1", Some(Language::Python));
        PreAnalysisPhase.execute(&mut context, &file).await.unwrap();
        assert!(context.ast_cache.is_some());
    }
}
