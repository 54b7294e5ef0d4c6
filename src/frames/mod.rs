//! Pluggable validation frames (spec.md §4.5/§4.6, GLOSSARY "Frame").
//!
//! Grounded on `original_source/src/warden/validation/frames/security/
//! frame.py`'s `ValidationFrame` base class, which the source expresses as
//! a deep inheritance chain (`ValidationFrame` -> `SecurityFrame` ->
//! framework-specific subclasses). Per spec.md §9's "Deep inheritance"
//! design note, that hierarchy collapses here to one `Frame` trait object
//! plus a small `BatchExecutable` capability a frame opts into, rather than
//! a class tree.

pub mod cache;
pub mod checks;
pub mod executor;
pub mod registry;
pub mod security;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::core::model::{CodeFile, FrameResult};
use crate::lang::Language;

/// `scope` a frame declares itself at (spec.md §4.5's frame contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameScope {
    /// Operates on one file at a time, no cross-file state.
    FileLevel,
    /// Needs visibility across the whole batch of files in one scan.
    CrossFile,
}

/// Static metadata a frame declares about itself, independent of any one
/// execution (spec.md §4.5's frame contract fields).
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    pub frame_id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Lower runs first under the `SEQUENTIAL` strategy.
    pub priority: u32,
    pub scope: FrameScope,
    /// Whether a `failed` status from this frame forces pipeline status
    /// `FAILED` (as opposed to `COMPLETED_WITH_FAILURES`).
    pub is_blocker: bool,
    pub version: String,
    pub author: String,
    /// Languages this frame has anything useful to say about; empty means
    /// "all languages".
    pub applicability: Vec<Language>,
}

/// A pluggable validator focused on one concern (security, antipattern,
/// resilience...). Produces a [`FrameResult`] per file.
#[async_trait]
pub trait Frame: Send + Sync {
    /// Static identity/configuration, read by the registry and executor.
    fn metadata(&self) -> &FrameMetadata;

    /// Run this frame against one file.
    async fn execute(&self, file: &CodeFile) -> Result<FrameResult>;
}

/// Opt-in capability: a frame that can process a whole batch of files in
/// one call, which lets the security frame's LLM step batch up to 10
/// findings into a single request (spec.md §4.5's frame contract).
#[async_trait]
pub trait BatchExecutable: Frame {
    async fn execute_batch(&self, files: &[CodeFile]) -> Result<Vec<FrameResult>>;
}

/// Per-frame budget applied to the LLM-batching step of a
/// `BatchExecutable` frame (spec.md §4.5).
pub const MAX_BATCH_FINDINGS_PER_CALL: usize = 10;
pub const BATCH_TOKEN_BUDGET: u32 = 6000;
