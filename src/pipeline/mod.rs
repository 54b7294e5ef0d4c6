//! The pipeline orchestrator (spec.md §4.7/§4.8/§4.9/§4.10/§4.11).
//!
//! Grounded on
//! `original_source/.../pipeline/application/phase_orchestrator.py`'s
//! `PhaseOrchestrator` (the phase sequence and per-phase exception
//! handling) and `orchestrator/orchestrator.py`'s `Orchestrator`
//! (`_apply_baseline`, `_ensure_state_consistency`, the overall-deadline
//! `asyncio.wait_for` wrapper). `PipelineContext` is scoped to one file
//! (spec.md §3), so `PipelineOrchestrator::run_file` is the unit of work;
//! a host scanning many files drives one orchestrator run per file.

pub mod baseline;
pub mod orchestrator;
pub mod phases;
pub mod reconciler;
pub mod result_builder;

pub use orchestrator::PipelineOrchestrator;
pub use result_builder::ScanResult;
