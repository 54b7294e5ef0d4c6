//! Triage phase (spec.md §4.7 row 2): assigns a per-file triage lane that
//! later phases use to bias LLM tier/model choice. Runs only when
//! `use_llm=true` and `analysis_level != BASIC` — the orchestrator checks
//! that condition before calling this phase, since it depends on
//! `WardenConfig` the phase itself does not hold.
//!
//! No `original_source/` file under `pipeline/` is dedicated to triage in
//! the retrieval pack (the closest analog, `phase_orchestrator.py`, folds
//! it into a single `_execute_triage_async` stub); the lane heuristic
//! below is designed directly from spec.md §4.7's "triage labels on each
//! file's metadata" using the same entry-point/auth-pattern signals
//! `pre_analysis` already gathers, so Triage stays cheap and
//! deterministic when the LLM call itself is unavailable.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, FileAnalysisContext, PipelineContext};
use crate::llm::orchestrated::OrchestratedLlmClient;
use crate::llm::types::LlmRequest;

/// Lanes a file can be routed to. `Priority` biases Classification toward
/// running every frame at elevated priority; `Standard` is the default;
/// `Low` is used for files with no entry-point/input-source signal at all.
const LANE_PRIORITY: &str = "priority";
const LANE_STANDARD: &str = "standard";
const LANE_LOW: &str = "low";

pub struct TriagePhase {
    llm: Option<Arc<OrchestratedLlmClient>>,
    model: String,
}

impl TriagePhase {
    pub fn new() -> Self {
        Self { llm: None, model: "claude-haiku".to_string() }
    }

    pub fn with_llm(mut self, client: Arc<OrchestratedLlmClient>, model: impl Into<String>) -> Self {
        self.llm = Some(client);
        self.model = model.into();
        self
    }

    fn heuristic_lane(&self, context: &PipelineContext) -> &'static str {
        let path_display = context.file_path.display().to_string();
        if context.project_intelligence.entry_points.contains(&path_display)
            || context.project_intelligence.auth_patterns.contains(&path_display)
        {
            return LANE_PRIORITY;
        }
        if context.project_intelligence.input_sources.is_empty() && context.project_intelligence.critical_sinks.is_empty() {
            return LANE_LOW;
        }
        LANE_STANDARD
    }

    async fn llm_lane(&self, llm: &Arc<OrchestratedLlmClient>, file: &CodeFile) -> Option<String> {
        let language = file.language.map(|l| l.catalog_key()).unwrap_or("text");
        let system_prompt = "You triage source files for a security review queue. Reply with exactly one \
            word: priority, standard, or low. No punctuation, no explanation."
            .to_string();
        let user_prompt = format!("File language: {language}\n\n```{language}\n{}\n```", file.content);
        let request = LlmRequest::new(system_prompt, user_prompt, self.model.clone());

        match llm.send(&request, Some("triage")).await {
            Ok(response) if response.success => match response.content.trim().to_ascii_lowercase().as_str() {
                LANE_PRIORITY => Some(LANE_PRIORITY.to_string()),
                LANE_LOW => Some(LANE_LOW.to_string()),
                LANE_STANDARD => Some(LANE_STANDARD.to_string()),
                _ => None,
            },
            Ok(_) => None,
            Err(error) => {
                debug!(%error, "triage LLM call failed, falling back to heuristic lane");
                None
            }
        }
    }
}

impl Default for TriagePhase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Phase for TriagePhase {
    fn name(&self) -> &'static str {
        "TRIAGE"
    }

    async fn execute(&self, context: &mut PipelineContext, file: &CodeFile) -> Result<()> {
        let lane = match &self.llm {
            Some(llm) => self.llm_lane(llm, file).await.unwrap_or_else(|| self.heuristic_lane(context).to_string()),
            None => self.heuristic_lane(context).to_string(),
        };

        context
            .file_contexts
            .entry(context.file_path.clone())
            .or_insert_with(FileAnalysisContext::default)
            .triage_lane = Some(lane);
        Ok(())
    }
}
