//! One module per row of spec.md §4.7's phase table.

pub mod analysis;
pub mod classification;
pub mod cleaning;
pub mod fortification;
pub mod pre_analysis;
pub mod triage;
pub mod validation;
pub mod verification;

use async_trait::async_trait;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, PipelineContext};

/// A discrete pipeline phase: reads whatever prior state it needs out of
/// `context` and extends it in place (spec.md §4.7).
#[async_trait]
pub trait Phase: Send + Sync {
    /// Name used in `context.errors`/`context.warnings` and log fields.
    fn name(&self) -> &'static str;

    async fn execute(&self, context: &mut PipelineContext, file: &CodeFile) -> Result<()>;
}
