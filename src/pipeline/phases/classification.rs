//! Classification phase (spec.md §4.7 row 4): frame selection, per-frame
//! priority overrides, and suppression-rule derivation. The only phase
//! that "cannot be disabled — core invariant": the orchestrator always
//! calls it, regardless of `PhaseConfig`.
//!
//! Grounded on `original_source/.../pipeline/application/phase_orchestrator.py`'s
//! `_execute_classification_async`, which always selects frames (falling
//! back to "all registered frames" rather than skipping the step) and
//! optionally asks the LLM for a richer characterization. That module is
//! not in the retrieval pack in full, so the LLM-characteristics mapping
//! below is written directly from `llm::types::ClassificationResult`'s
//! field shape (spec.md §3 supplemented DTOs).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, FileContext, PipelineContext, SuppressionRule};
use crate::llm::orchestrated::OrchestratedLlmClient;
use crate::llm::types::{ClassificationResult, LlmRequest};

/// Frame ids this build ships (just `security` today). A host that loads
/// additional frames into its own `FrameExecutor` can still select them by
/// hint name; this list only biases the default/heuristic selection.
const DEFAULT_FRAMES: &[&str] = &["security"];

pub struct ClassificationPhase {
    llm: Option<Arc<OrchestratedLlmClient>>,
    model: String,
}

impl ClassificationPhase {
    pub fn new() -> Self {
        Self { llm: None, model: "claude-sonnet".to_string() }
    }

    pub fn with_llm(mut self, client: Arc<OrchestratedLlmClient>, model: impl Into<String>) -> Self {
        self.llm = Some(client);
        self.model = model.into();
        self
    }

    fn heuristic_selection(&self, context: &PipelineContext, file_context: FileContext) -> (Vec<String>, String) {
        if matches!(file_context, FileContext::Documentation) {
            return (Vec::new(), "documentation file carries no executable code; no frame selected".to_string());
        }
        let path_display = context.file_path.display().to_string();
        let is_entry_point = context.project_intelligence.entry_points.contains(&path_display);
        let is_auth = context.project_intelligence.auth_patterns.contains(&path_display);
        let reasoning = if is_entry_point || is_auth {
            "entry-point/auth-relevant file; running the full validation frame set".to_string()
        } else {
            "standard production file; running the default frame set".to_string()
        };
        (DEFAULT_FRAMES.iter().map(|s| s.to_string()).collect(), reasoning)
    }

    async fn classify_with_llm(&self, llm: &Arc<OrchestratedLlmClient>, file: &CodeFile) -> Option<ClassificationResult> {
        let language = file.language.map(|l| l.catalog_key()).unwrap_or("text");
        let system_prompt = "You are a code triage assistant. Respond with valid JSON only, matching exactly \
            the schema given, no markdown formatting, no explanations outside the JSON object."
            .to_string();
        let user_prompt = format!(
            "Classify the following {language} file for security-review triage. Respond with JSON matching \
             exactly this schema:\n\
             {{\"category\": \"<string>\", \"characteristics\": {{\"is_test_file\": <bool>, \
             \"is_generated\": <bool>, \"is_entry_point\": <bool>, \"handles_user_input\": <bool>}}, \
             \"confidence\": <number 0..1>}}\n\n\
             Source:\n```{language}\n{content}\n```",
            content = file.content,
        );
        let request = LlmRequest::new(system_prompt, user_prompt, self.model.clone());
        match llm.send(&request, Some("classification")).await {
            Ok(response) if response.success => parse_classification(&response.content),
            Ok(_) => None,
            Err(error) => {
                debug!(%error, "classification LLM call failed, falling back to heuristic selection");
                None
            }
        }
    }
}

impl Default for ClassificationPhase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Phase for ClassificationPhase {
    fn name(&self) -> &'static str {
        "CLASSIFICATION"
    }

    async fn execute(&self, context: &mut PipelineContext, file: &CodeFile) -> Result<()> {
        let file_context = context
            .file_contexts
            .get(&context.file_path)
            .map(|c| c.file_context)
            .unwrap_or_default();

        let (mut selected, mut reasoning) = self.heuristic_selection(context, file_context);
        let mut priorities: HashMap<String, u32> = selected.iter().map(|id| (id.clone(), 100)).collect();

        if let Some(llm) = self.llm.clone() {
            if let Some(classification) = self.classify_with_llm(&llm, file).await {
                if classification.characteristics.is_generated {
                    context.suppression_rules.push(SuppressionRule {
                        rule_id: None,
                        file_glob: Some(context.file_path.display().to_string()),
                    });
                    selected.clear();
                    reasoning = format!(
                        "LLM classified this file as generated code (confidence {:.2}); suppressing all findings",
                        classification.confidence
                    );
                } else if classification.characteristics.handles_user_input || classification.characteristics.is_entry_point {
                    for id in &selected {
                        priorities.insert(id.clone(), 10);
                    }
                    reasoning = format!(
                        "LLM classified this file as '{}' (confidence {:.2}); handles user input or is an entry point, running frames at elevated priority",
                        classification.category, classification.confidence
                    );
                }
            }
        }

        context.selected_frames = Some(selected);
        context.frame_priorities = priorities;
        context.classification_reasoning = Some(reasoning);
        Ok(())
    }
}

fn parse_classification(content: &str) -> Option<ClassificationResult> {
    let candidate = extract_json_object(content)?;
    serde_json::from_str::<ClassificationResult>(candidate)
        .ok()
        .or_else(|| serde_json::from_str::<Value>(candidate).ok().map(|_| ClassificationResult::default()))
}

fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in content[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::Language;
    use std::path::PathBuf;

    fn ctx() -> PipelineContext {
        PipelineContext::new(PathBuf::from("/p"), PathBuf::from("/p/app.py"), "x".into(), Some(Language::Python))
    }

    #[tokio::test]
    async fn heuristic_selection_picks_default_frames() {
        let mut context = ctx();
        let file = CodeFile::new(PathBuf::from("/p/app.py"), "print(1)", Some(Language::Python));
        ClassificationPhase::new().execute(&mut context, &file).await.unwrap();
        assert_eq!(context.selected_frames, Some(vec!["security".to_string()]));
        assert!(context.classification_reasoning.is_some());
    }

    #[tokio::test]
    async fn documentation_file_selects_no_frames() {
        let mut context = ctx();
        context.file_contexts.insert(
            context.file_path.clone(),
            crate::core::model::FileAnalysisContext { file_context: FileContext::Documentation, triage_lane: None },
        );
        let file = CodeFile::new(PathBuf::from("/p/app.py"), "# docs", Some(Language::Python));
        ClassificationPhase::new().execute(&mut context, &file).await.unwrap();
        assert_eq!(context.selected_frames, Some(vec![]));
    }

    #[tokio::test]
    async fn entry_point_file_runs_with_elevated_reasoning() {
        let mut context = ctx();
        context.project_intelligence.entry_points.push("/p/app.py".to_string());
        let file = CodeFile::new(PathBuf::from("/p/app.py"), "print(1)", Some(Language::Python));
        ClassificationPhase::new().execute(&mut context, &file).await.unwrap();
        assert!(context.classification_reasoning.unwrap().contains("entry-point"));
    }

    #[test]
    fn parses_well_formed_classification_reply() {
        let content = r#"{"category":"web-handler","characteristics":{"is_test_file":false,
            "is_generated":false,"is_entry_point":true,"handles_user_input":true},"confidence":0.8}"#;
        let parsed = parse_classification(content).unwrap();
        assert_eq!(parsed.category, "web-handler");
        assert!(parsed.characteristics.handles_user_input);
    }
}
