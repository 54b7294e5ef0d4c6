//! Cleaning phase (spec.md §4.7 row 8 / §9): the mirror extension point to
//! Fortification, for quality rather than security concerns. Consumes the
//! same `quality_metrics` Analysis populated and derives
//! `cleaning_suggestions[]`, `refactorings[]`, and `quality_score_after`.
//!
//! spec.md §4.11's quality-score rule applies here too: `0.0` is a
//! legitimate score for a file with no redeeming qualities and must not be
//! read as "cleaning did not run" — only `None` means that.

use async_trait::async_trait;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, PipelineContext};

pub struct CleaningPhase;

#[async_trait]
impl super::Phase for CleaningPhase {
    fn name(&self) -> &'static str {
        "CLEANING"
    }

    async fn execute(&self, context: &mut PipelineContext, _file: &CodeFile) -> Result<()> {
        for hotspot in context.quality_metrics.hotspots.clone() {
            context.cleaning_suggestions.push(format!("{hotspot}: split into smaller units"));
            context.refactorings.push(format!("extract-function candidate: {hotspot}"));
        }
        for quick_win in context.quality_metrics.quick_wins.clone() {
            context.cleaning_suggestions.push(quick_win);
        }

        let recovered = context.quality_metrics.quick_wins.len() as f64 * 0.1;
        let before = context.quality_score_before.unwrap_or(10.0);
        context.quality_score_after = Some((before + recovered).min(10.0));
        Ok(())
    }
}
