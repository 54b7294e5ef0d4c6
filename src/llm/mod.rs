//! LLM provider contract, concrete providers, and tiered orchestration
//! (spec.md §4.3).

pub mod circuit_breaker;
pub mod client;
pub mod metrics;
pub mod orchestrated;
pub mod providers;
pub mod registry;
pub mod resilience;
pub mod types;

pub use circuit_breaker::ProviderCircuitBreaker;
pub use client::ILlmClient;
pub use orchestrated::OrchestratedLlmClient;
pub use registry::{create as create_provider, registered_providers, ProviderSpec};
pub use types::{LlmProvider, LlmRequest, LlmResponse};
