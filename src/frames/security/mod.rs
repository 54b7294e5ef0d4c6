//! The security frame (spec.md §4.5's reference implementation): the
//! seven-step pipeline combining pattern checks, AST signals, taint
//! analysis, best-effort LSP/semantic context, LLM verification, and
//! taint-path promotion.
//!
//! Grounded on
//! `original_source/src/warden/validation/frames/security/security_frame.py`
//! (step ordering and the LSP/semantic-search "best-effort" framing) and
//! `ast_analyzer.py` (the structural-signal extraction this module calls
//! `ast_signals`).

mod ast_signals;
mod frame;
mod llm_verify;

pub use ast_signals::AstSignals;
pub use frame::{LspDataFlowProvider, SecurityFrame, SemanticSearchProvider};
pub use llm_verify::SecurityVerificationContext;
