//! `SecurityFrame`: spec.md §4.5's reference validation frame, wiring the
//! seven steps together into one `Frame` implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::core::config::TaintConfig;
use crate::core::errors::Result;
use crate::core::model::{CodeFile, Finding, FrameResult, FrameStatus, MachineContext, Severity, VerificationMetadata};
use crate::frames::checks::CheckRegistry;
use crate::frames::security::ast_signals;
use crate::frames::security::llm_verify::{self, SecurityVerificationContext};
use crate::frames::{Frame, FrameMetadata, FrameScope};
use crate::lang::Language;
use crate::llm::orchestrated::OrchestratedLlmClient;
use crate::llm::types::LlmRequest;
use crate::taint::{TaintAnalyzer, TaintCatalog, TaintPath};

/// Best-effort data-flow lookup against a registered LSP server (spec.md
/// §4.5 step 4). No implementation ships in this crate — a host wires one
/// in when it has a running language server to ask. Absence is not an
/// error; the step is simply skipped.
#[async_trait]
pub trait LspDataFlowProvider: Send + Sync {
    /// Callers/callees of the symbol at `file_path:line` whose name
    /// suggests it touches untrusted input ("request", "input", "param").
    async fn blast_radius(&self, file_path: &std::path::Path, line: usize) -> Vec<String>;
}

/// Best-effort project-wide semantic context lookup (spec.md §4.5 step
/// 5). As with `LspDataFlowProvider`, no concrete implementation ships
/// here; a host supplies one backed by whatever embedding index it runs.
#[async_trait]
pub trait SemanticSearchProvider: Send + Sync {
    /// Up to `limit` related code chunks from other files, for LLM context.
    async fn related_chunks(&self, file_path: &std::path::Path, line: usize, limit: usize) -> Vec<String>;
}

pub struct SecurityFrame {
    metadata: FrameMetadata,
    checks: CheckRegistry,
    catalog: TaintCatalog,
    taint_config: TaintConfig,
    llm: Option<Arc<OrchestratedLlmClient>>,
    llm_model: String,
    lsp: Option<Arc<dyn LspDataFlowProvider>>,
    semantic_search: Option<Arc<dyn SemanticSearchProvider>>,
}

impl SecurityFrame {
    pub fn new(project_root: &std::path::Path, taint_config: TaintConfig) -> Self {
        Self {
            metadata: FrameMetadata {
                frame_id: "security".to_string(),
                name: "Security".to_string(),
                description: "Pattern, AST, taint, and LLM-verified security findings".to_string(),
                category: "security".to_string(),
                priority: 100,
                scope: FrameScope::FileLevel,
                is_blocker: true,
                version: "1.0.0".to_string(),
                author: "warden-core".to_string(),
                applicability: vec![Language::Python, Language::JavaScript, Language::TypeScript, Language::Go, Language::Java],
            },
            checks: CheckRegistry::with_default_checks(),
            catalog: TaintCatalog::load(project_root),
            taint_config,
            llm: None,
            llm_model: "claude-sonnet".to_string(),
            lsp: None,
            semantic_search: None,
        }
    }

    pub fn with_llm(mut self, client: Arc<OrchestratedLlmClient>, model: impl Into<String>) -> Self {
        self.llm = Some(client);
        self.llm_model = model.into();
        self
    }

    pub fn with_lsp(mut self, provider: Arc<dyn LspDataFlowProvider>) -> Self {
        self.lsp = Some(provider);
        self
    }

    pub fn with_semantic_search(mut self, provider: Arc<dyn SemanticSearchProvider>) -> Self {
        self.semantic_search = Some(provider);
        self
    }

    /// Step 7: every `TaintPath` at or above the confidence threshold is a
    /// blocking `high` finding; below threshold, non-blocking `medium`.
    fn promote_taint_paths(&self, file: &CodeFile, paths: &[TaintPath]) -> Vec<Finding> {
        paths
            .iter()
            .map(|path| {
                let promoted = path.confidence >= self.taint_config.confidence_threshold;
                Finding {
                    id: Finding::new_id("SEC-TAINT"),
                    severity: if promoted { Severity::High } else { Severity::Medium },
                    message: format!("Tainted data flows from {} to {}", path.source.name, path.sink.name),
                    location: format!("{}:{}", file.path.display(), path.sink.line),
                    detail: if path.is_sanitized {
                        format!("Flow passes through sanitizer(s): {}", path.sanitizers.join(", "))
                    } else {
                        "No sanitizer detected on this path".to_string()
                    },
                    code_snippet: String::new(),
                    rule_id: "SEC-TAINT".to_string(),
                    file_path: file.path.clone(),
                    is_blocker: promoted,
                    verification_metadata: VerificationMetadata::default(),
                    machine_context: Some(MachineContext {
                        source: path.source.name.clone(),
                        sink: path.sink.name.clone(),
                        data_flow_path: path.transformations.clone(),
                    }),
                }
            })
            .collect()
    }

    async fn run_llm_verification(&self, file: &CodeFile, context: SecurityVerificationContext) -> Vec<Finding> {
        let Some(llm) = &self.llm else { return Vec::new() };
        let language = file.language.map(|l| l.catalog_key()).unwrap_or("text");
        let (system_prompt, user_prompt) = llm_verify::build_prompt(&file.content, language, &context);
        let request = LlmRequest::new(system_prompt, user_prompt, self.llm_model.clone());

        match llm.send(&request, Some(self.metadata.frame_id.as_str())).await {
            Ok(response) if response.success => llm_verify::parse_findings(&response.content, &file.path),
            Ok(_) => Vec::new(),
            Err(error) => {
                debug!(%error, "security frame LLM verification call failed, continuing without it");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Frame for SecurityFrame {
    fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    async fn execute(&self, file: &CodeFile) -> Result<FrameResult> {
        let started = Instant::now();

        // Step 1: pattern checks.
        let check_results = self.checks.run_all(file);
        let mut findings: Vec<Finding> = check_results.iter().flat_map(|r| r.findings.clone()).collect();
        let check_summaries: Vec<String> =
            findings.iter().map(|f| format!("[{}] {} ({})", f.rule_id, f.message, f.location)).collect();

        // Step 2: AST structural signals (context only, not findings).
        let signals = ast_signals::extract(&file.content, file.language);

        // Step 3: taint analysis.
        let taint_paths = match file.language {
            Some(language) => {
                let analyzer = TaintAnalyzer::new(&self.catalog, self.taint_config);
                analyzer.analyze(&file.content, language)
            }
            None => Vec::new(),
        };

        // Step 4: LSP data-flow, best-effort.
        let mut blast_radius = Vec::new();
        if let Some(lsp) = &self.lsp {
            for finding in &findings {
                if let Some(line) = finding.location.rsplit(':').next().and_then(|s| s.parse::<usize>().ok()) {
                    blast_radius.extend(lsp.blast_radius(&file.path, line).await);
                }
            }
        }

        // Step 5: semantic-search context, best-effort.
        let mut related_chunks = Vec::new();
        if let Some(semantic) = &self.semantic_search {
            related_chunks.extend(semantic.related_chunks(&file.path, 1, 3).await);
        }

        // Step 6: LLM verification.
        let verification_context = SecurityVerificationContext {
            check_summaries,
            ast_signals: signals,
            taint_paths: taint_paths.clone(),
            blast_radius,
            related_chunks,
        };
        findings.extend(self.run_llm_verification(file, verification_context).await);

        // Step 7: taint-path promotion.
        findings.extend(self.promote_taint_paths(file, &taint_paths));

        let status = FrameResult::status_from_findings(&findings);
        Ok(FrameResult {
            frame_id: self.metadata.frame_id.clone(),
            frame_name: self.metadata.name.clone(),
            status,
            duration: started.elapsed(),
            issues_found: findings.len(),
            is_blocker: self.metadata.is_blocker,
            findings,
            metadata: Default::default(),
        })
    }
}

/// Construct an empty-file marker used by the executor when a frame is
/// gated by a pre-rule or there are zero files to give it (spec.md §4.5
/// "skipped if zero files").
pub fn skipped_result(frame_id: &str, frame_name: &str, is_blocker: bool) -> FrameResult {
    FrameResult {
        frame_id: frame_id.to_string(),
        frame_name: frame_name.to_string(),
        status: FrameStatus::Skipped,
        duration: std::time::Duration::ZERO,
        issues_found: 0,
        is_blocker,
        findings: Vec::new(),
        metadata: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn frame() -> SecurityFrame {
        SecurityFrame::new(Path::new("/nonexistent"), TaintConfig::default())
    }

    #[tokio::test]
    async fn pattern_check_and_taint_findings_survive_without_llm() {
        let file = CodeFile::new(
            PathBuf::from("app.py"),
            "cursor.execute(\"SELECT * FROM t WHERE name = \" + q)",
            Some(Language::Python),
        );
        let result = frame().execute(&file).await.unwrap();
        assert!(!result.findings.is_empty());
        assert_eq!(result.status, FrameStatus::Failed);
    }

    #[tokio::test]
    async fn clean_file_passes() {
        let file = CodeFile::new(PathBuf::from("app.py"), "def add(a, b):\n    return a + b\n", Some(Language::Python));
        let result = frame().execute(&file).await.unwrap();
        assert_eq!(result.status, FrameStatus::Passed);
        assert!(result.findings.is_empty());
    }

    #[tokio::test]
    async fn high_confidence_taint_path_is_blocker() {
        let file = CodeFile::new(
            PathBuf::from("app.py"),
            "from flask import request\ndef h():\n    q = request.args.get(\"q\")\n    cursor.execute(\"SELECT * FROM t WHERE name = \" + q)\n",
            Some(Language::Python),
        );
        let result = frame().execute(&file).await.unwrap();
        assert!(result.findings.iter().any(|f| f.rule_id == "SEC-TAINT" && f.is_blocker));
    }
}
