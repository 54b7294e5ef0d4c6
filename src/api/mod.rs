//! Public API surface.
//!
//! The rest of the crate is organized around the pipeline's internal
//! phases; this module is the one documented front door a host program
//! (a CLI, a CI action, an editor plugin) depends on: a facade over the
//! internal module tree (SPEC_FULL.md §1).

pub mod engine;

pub use engine::{EngineConfig, WardenEngine};
pub use crate::pipeline::result_builder::{ScanMetadata, ScanOutcome, ScanResult};
