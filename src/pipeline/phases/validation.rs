//! Validation phase (spec.md §4.7 row 5): runs every frame `Classification`
//! selected through the `FrameExecutor`, stores the per-frame results, and
//! re-aggregates `context.findings`.
//!
//! Grounded on
//! `original_source/.../orchestrator/frame_executor.py`'s
//! `_execute_frame_with_rules` call site inside
//! `phase_orchestrator.py`'s `_execute_validation_async`, which hands the
//! classification's selected frames straight to the executor and folds the
//! per-frame entries back into the shared context.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, FileContext, PipelineContext};
use crate::frames::executor::FrameExecutor;

pub struct ValidationPhase {
    executor: Arc<FrameExecutor>,
}

impl ValidationPhase {
    pub fn new(executor: Arc<FrameExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl super::Phase for ValidationPhase {
    fn name(&self) -> &'static str {
        "VALIDATION"
    }

    async fn execute(&self, context: &mut PipelineContext, file: &CodeFile) -> Result<()> {
        let file_context = context
            .file_contexts
            .get(&context.file_path)
            .map(|c| c.file_context)
            .unwrap_or_default();

        let selected = context.selected_frames.clone();
        let priorities = context.frame_priorities.clone();
        let mut warnings = Vec::new();

        let entries = self
            .executor
            .run(file, file_context, selected.as_deref(), Some(&priorities), &mut warnings)
            .await;

        context.warnings.extend(warnings);
        context.frame_results = entries;
        context.reaggregate_findings();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{FrameExecutionConfig, TaintConfig};
    use crate::frames::security::SecurityFrame;
    use crate::frames::Frame;
    use crate::lang::Language;
    use std::path::PathBuf;

    fn ctx() -> PipelineContext {
        PipelineContext::new(PathBuf::from("/p"), PathBuf::from("/p/app.py"), "x".into(), Some(Language::Python))
    }

    fn executor() -> Arc<FrameExecutor> {
        let frames: Vec<Arc<dyn Frame>> = vec![Arc::new(SecurityFrame::new(&PathBuf::from("/p"), TaintConfig::default()))];
        Arc::new(FrameExecutor::new(frames, FrameExecutionConfig::default(), false))
    }

    #[tokio::test]
    async fn runs_selected_frames_and_reaggregates() {
        let mut context = ctx();
        context.selected_frames = Some(vec!["security".to_string()]);
        let file = CodeFile::new(PathBuf::from("/p/app.py"), "q = request.args.get('q')\ncursor.execute(q)\n", Some(Language::Python));
        ValidationPhase::new(executor()).execute(&mut context, &file).await.unwrap();
        assert!(context.frame_results.contains_key("security"));
    }

    #[tokio::test]
    async fn empty_selection_runs_zero_frames() {
        let mut context = ctx();
        context.selected_frames = Some(Vec::new());
        let file = CodeFile::new(PathBuf::from("/p/app.py"), "x = 1\n", Some(Language::Python));
        ValidationPhase::new(executor()).execute(&mut context, &file).await.unwrap();
        assert!(context.frame_results.is_empty());
        assert!(context.findings.is_empty());
    }

    #[tokio::test]
    async fn none_selection_runs_every_loaded_frame() {
        let mut context = ctx();
        assert!(context.selected_frames.is_none());
        let file = CodeFile::new(PathBuf::from("/p/app.py"), "x = 1\n", Some(Language::Python));
        ValidationPhase::new(executor()).execute(&mut context, &file).await.unwrap();
        assert!(context.frame_results.contains_key("security"));
    }
}
