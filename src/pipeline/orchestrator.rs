//! `PipelineOrchestrator` (spec.md §4.7-§4.11): wires the eight phases
//! together in fixed order, enforces the overall pipeline deadline, and
//! calls baseline subtraction, the reconciler, and the result builder.
//!
//! Grounded on
//! `original_source/.../pipeline/application/phase_orchestrator.py`'s
//! `PhaseOrchestrator.run` (fixed phase sequence, per-phase try/except
//! recording onto `context.errors` rather than aborting) and
//! `orchestrator/orchestrator.py`'s `Orchestrator.run_async` (the overall
//! `asyncio.wait_for` deadline wrapper, and the baseline/reconcile/build
//! tail sequence). `PipelineContext` is scoped to one file (spec.md §3),
//! so `run_file` is the orchestrator's unit of work.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::config::WardenConfig;
use crate::core::errors::{Result, WardenError};
use crate::core::model::{CodeFile, PipelineContext, ValidationPipeline};
use crate::frames::executor::FrameExecutor;
use crate::frames::security::SecurityFrame;
use crate::frames::Frame;
use crate::lang::detect_language;
use crate::llm::orchestrated::OrchestratedLlmClient;
use crate::llm::registry::{self, ProviderSpec};
use crate::llm::types::LlmProvider;
use crate::pipeline::baseline;
use crate::pipeline::phases::{
    analysis::AnalysisPhase, classification::ClassificationPhase, cleaning::CleaningPhase, fortification::FortificationPhase,
    pre_analysis::PreAnalysisPhase, triage::TriagePhase, validation::ValidationPhase, verification::VerificationPhase, Phase,
};
use crate::pipeline::reconciler;
use crate::pipeline::result_builder::{self, ScanResult};

/// Build the tiered `OrchestratedLlmClient` described by `config.llm`,
/// skipping any fast-tier entry whose provider fails to construct (a
/// missing credential never blocks a scan; it just drops that entry).
fn build_llm_client(config: &WardenConfig) -> Result<Arc<OrchestratedLlmClient>> {
    let smart_provider =
        LlmProvider::parse(&config.llm.smart.provider).ok_or_else(|| WardenError::config(format!("unknown LLM provider '{}'", config.llm.smart.provider)))?;
    let smart = registry::create(&ProviderSpec { provider: smart_provider, model: config.llm.smart.model.clone(), base_url: config.llm.smart.base_url.clone() })?;

    let mut fast = Vec::new();
    for entry in &config.llm.fast {
        let Some(provider) = LlmProvider::parse(&entry.provider) else {
            warn!(provider = %entry.provider, "unknown fast-tier provider in config, skipping");
            continue;
        };
        match registry::create(&ProviderSpec { provider, model: entry.model.clone(), base_url: entry.base_url.clone() }) {
            Ok(client) => fast.push(client),
            Err(error) => warn!(%error, provider = %entry.provider, "failed to construct fast-tier provider, skipping"),
        }
    }

    Ok(Arc::new(OrchestratedLlmClient::new(fast, smart, Duration::from_secs(config.llm.fast_tier_race_ceiling_secs))))
}

/// Orchestrates one file's journey through every pipeline phase.
pub struct PipelineOrchestrator {
    config: WardenConfig,
    project_root: PathBuf,
    llm: Option<Arc<OrchestratedLlmClient>>,
    executor: Arc<FrameExecutor>,
}

impl PipelineOrchestrator {
    /// Build an orchestrator for `project_root` under `config`. Constructs
    /// the LLM client (if `config.llm.use_llm`) and the default frame set
    /// (just `security`, today) up front so `run_file` stays cheap per call.
    pub fn new(project_root: impl Into<PathBuf>, mut config: WardenConfig) -> Result<Self> {
        config.apply_basic_level_overrides();
        let project_root = project_root.into();

        let llm = if config.llm.use_llm { Some(build_llm_client(&config)?) } else { None };

        let mut security = SecurityFrame::new(&project_root, config.taint.clone());
        if let Some(client) = &llm {
            security = security.with_llm(client.clone(), config.llm.smart.model.clone());
        }
        let frames: Vec<Arc<dyn Frame>> = vec![Arc::new(security)];
        let uses_local_provider = LlmProvider::parse(&config.llm.smart.provider).map(LlmProvider::is_local).unwrap_or(false);
        let executor = Arc::new(FrameExecutor::new(frames, config.frame_execution.clone(), uses_local_provider));

        Ok(Self { config, project_root, llm, executor })
    }

    /// Run the full phase sequence against one file's source, producing a
    /// reconciled `ScanResult`. The overall pipeline deadline (spec.md §5,
    /// default 300s, `config.pipeline_timeout_secs`) wraps the whole phase
    /// loop; on expiry the pipeline status is forced to `Failed` and an
    /// explanatory error is recorded, matching spec.md §5's cancellation
    /// contract.
    pub async fn run_file(&self, path: impl Into<PathBuf>, content: impl Into<Arc<str>>) -> ScanResult {
        let path = path.into();
        let content = content.into();
        let language = detect_language(&path);
        let file = CodeFile::new(path.clone(), content.clone(), language);

        let mut pipeline = ValidationPipeline::new();
        let mut context = PipelineContext::new(self.project_root.clone(), path, content, language);

        let deadline = Duration::from_secs(self.config.pipeline_timeout_secs.max(1));
        match tokio::time::timeout(deadline, self.run_phases(&mut context, &file)).await {
            Ok(()) => {}
            Err(_) => {
                context.errors.push(format!("pipeline deadline of {}s elapsed", self.config.pipeline_timeout_secs));
            }
        }

        baseline::apply(&mut context);
        reconciler::reconcile(&mut pipeline, &mut context);
        result_builder::build(&pipeline, &context, self.config.frame_execution.strategy)
    }

    async fn run_phases(&self, context: &mut PipelineContext, file: &CodeFile) {
        if self.config.phases.enable_pre_analysis {
            self.run_phase(&PreAnalysisPhase, context, file).await;
        }

        if self.config.llm.use_llm && self.config.analysis_level != crate::core::config::AnalysisLevel::Basic {
            if let Some(llm) = &self.llm {
                let model = self.config.llm.fast.first().map(|p| p.model.clone()).unwrap_or_else(|| self.config.llm.smart.model.clone());
                self.run_phase(&TriagePhase::new().with_llm(llm.clone(), model), context, file).await;
            }
        }

        if self.config.phases.enable_analysis {
            let mut phase = AnalysisPhase::new();
            if let Some(llm) = &self.llm {
                phase = phase.with_llm(llm.clone(), self.config.llm.smart.model.clone());
            }
            self.run_phase(&phase, context, file).await;
        }

        // Classification cannot be disabled (spec.md §4.7's core invariant).
        let mut classification = ClassificationPhase::new();
        if let Some(llm) = &self.llm {
            classification = classification.with_llm(llm.clone(), self.config.llm.smart.model.clone());
        }
        self.run_phase(&classification, context, file).await;

        self.check_precondition(context, "VALIDATION", context.selected_frames.is_some());
        if self.config.phases.enable_validation {
            self.run_phase(&ValidationPhase::new(self.executor.clone()), context, file).await;
        }

        self.check_precondition(context, "VERIFICATION", !context.findings.is_empty() || !context.frame_results.is_empty());
        if self.config.phases.enable_issue_validation {
            if let Some(llm) = &self.llm {
                self.run_phase(&VerificationPhase::new(llm.clone(), self.config.llm.smart.model.clone()), context, file).await;
            }
        }

        self.check_precondition(context, "FORTIFICATION", !context.frame_results.is_empty());
        if self.config.phases.enable_fortification {
            self.run_phase(&FortificationPhase, context, file).await;
        }

        self.check_precondition(context, "CLEANING", context.quality_score_before.is_some());
        if self.config.phases.enable_cleaning {
            self.run_phase(&CleaningPhase, context, file).await;
        }
    }

    /// spec.md §4.7's phase precondition checks: a failed precondition is
    /// a warning, not an abort — the phase still runs afterward.
    fn check_precondition(&self, context: &mut PipelineContext, phase_name: &str, holds: bool) {
        if !holds {
            context.warnings.push(format!("{phase_name} precondition not met; running with partial state"));
        }
    }

    async fn run_phase(&self, phase: &dyn Phase, context: &mut PipelineContext, file: &CodeFile) {
        debug!(phase = phase.name(), file = %file.path.display(), "running phase");
        if let Err(error) = phase.execute(context, file).await {
            context.errors.push(format!("{}: {error}", phase.name()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_offline() -> WardenConfig {
        let mut config = WardenConfig::default();
        config.llm.use_llm = false;
        config
    }

    #[tokio::test]
    async fn clean_file_produces_clean_outcome() {
        let orchestrator = PipelineOrchestrator::new("/p", config_offline()).unwrap();
        let result = orchestrator.run_file("/p/app.py", "def add(a, b):\n    return a + b\n").await;
        assert_eq!(result.outcome(), result_builder::ScanOutcome::Clean);
    }

    #[tokio::test]
    async fn flask_sqli_file_produces_a_blocker_finding() {
        let orchestrator = PipelineOrchestrator::new("/p", config_offline()).unwrap();
        let source = "from flask import request\ndef search():\n    q = request.args.get(\"q\")\n    cursor.execute(\"SELECT * FROM t WHERE name = \" + q)\n";
        let result = orchestrator.run_file("/p/app.py", source).await;
        assert!(result.findings.iter().any(|f| f.is_blocker));
        assert_eq!(result.outcome(), result_builder::ScanOutcome::PolicyFailure);
    }

    #[tokio::test]
    async fn basic_level_disables_llm_dependent_phases() {
        let mut config = WardenConfig::default();
        config.analysis_level = crate::core::config::AnalysisLevel::Basic;
        let orchestrator = PipelineOrchestrator::new("/p", config).unwrap();
        assert!(orchestrator.llm.is_none());
    }
}
