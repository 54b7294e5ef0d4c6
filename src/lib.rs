//! # warden-core: static code security analysis engine
//!
//! `warden-core` is a library, not a CLI: it drives taint analysis,
//! frame-based validation, and an eight-phase pipeline over one file at a
//! time, returning an immutable [`ScanResult`] a host program (a CLI, a CI
//! action, an editor plugin) renders however it likes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          api (facade)                        │
//! ├──────────────┬──────────────┬───────────────┬────────────────┤
//! │   pipeline   │    frames    │      llm       │     taint      │
//! │ • phases (8) │ • executor   │ • registry     │ • analyzer     │
//! │ • baseline   │ • security   │ • orchestrated │ • catalog      │
//! │ • reconciler │ • cache      │ • circuit      │ • signals      │
//! │ • result     │              │   breaker      │                │
//! └──────────────┴──────────────┴───────────────┴────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use warden_core::{EngineConfig, WardenEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = WardenEngine::new(EngineConfig::new("./"))?;
//!     let results = engine.scan_directory("./src").await?;
//!     println!("scanned {} files", results.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::suspicious)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::fn_params_excessive_bools)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![cfg_attr(docsrs, feature(doc_cfg))]
// Additional allows for tests and examples
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

#[cfg(all(feature = "mimalloc", not(feature = "jemalloc")))]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(all(feature = "jemalloc", not(feature = "mimalloc")))]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

/// Core data model, error taxonomy, and configuration contract.
pub mod core;

/// Language detection for the five supported languages.
pub mod lang;

/// The taint-analysis engine: catalog, signals, and the three-pass
/// analyzer (spec.md §4.2).
pub mod taint;

/// Validation frames and the frame-execution layer: circuit breaker,
/// concurrency cap, per-frame timeout (spec.md §4.5-§4.6).
pub mod frames;

/// LLM provider orchestration: registry, tiered client, resilience
/// (spec.md §4.3-§4.4).
pub mod llm;

/// The eight-phase analysis pipeline and its orchestrator (spec.md
/// §4.7-§4.11).
pub mod pipeline;

/// Public API facade: re-exports the handful of types a host program
/// needs (SPEC_FULL.md §1).
pub mod api;

pub use api::{EngineConfig, ScanOutcome, ScanResult, WardenEngine};
pub use core::errors::{Result, ResultExt, WardenError};

/// Library version, read from the crate's own manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
