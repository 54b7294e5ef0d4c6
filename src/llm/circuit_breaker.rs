//! Per-provider three-state circuit breaker (spec.md §4.3, §5).
//!
//! Direct port of `original_source/src/warden/llm/circuit_breaker.py`'s
//! `ProviderCircuitBreaker`: CLOSED → OPEN after `fail_threshold`
//! consecutive failures, OPEN → HALF_OPEN after `open_duration` elapses,
//! HALF_OPEN → CLOSED after `success_threshold` consecutive successes in
//! the probing state (a single failure while HALF_OPEN sends it straight
//! back to OPEN). State is process-global per provider, guarded by a
//! `parking_lot::Mutex` in place of the Python source's `threading.Lock`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::llm::types::LlmProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
struct ProviderState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
        }
    }
}

/// Tracks failure/recovery state per provider across the whole orchestrated
/// client's lifetime (spec.md §8's circuit-breaker-open scenario).
#[derive(Debug)]
pub struct ProviderCircuitBreaker {
    fail_threshold: u32,
    open_duration: Duration,
    success_threshold: u32,
    states: Mutex<HashMap<LlmProvider, ProviderState>>,
}

impl Default for ProviderCircuitBreaker {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5 * 60), 1)
    }
}

impl ProviderCircuitBreaker {
    pub fn new(fail_threshold: u32, open_duration: Duration, success_threshold: u32) -> Self {
        Self {
            fail_threshold,
            open_duration,
            success_threshold,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Promote an OPEN circuit to HALF_OPEN once `open_duration` has
    /// elapsed since it tripped. Called at the top of every read/write so
    /// the transition happens lazily, matching the Python source's
    /// `_maybe_transition_to_half_open`.
    fn maybe_transition_to_half_open(&self, state: &mut ProviderState) {
        if state.state == CircuitState::Open {
            if let Some(opened_at) = state.opened_at {
                if opened_at.elapsed() >= self.open_duration {
                    state.state = CircuitState::HalfOpen;
                    state.consecutive_successes = 0;
                }
            }
        }
    }

    /// Whether calls to `provider` should currently be skipped.
    pub fn is_open(&self, provider: LlmProvider) -> bool {
        let mut states = self.states.lock();
        let entry = states.entry(provider).or_default();
        self.maybe_transition_to_half_open(entry);
        entry.state == CircuitState::Open
    }

    /// Record a failed call. CLOSED increments the failure streak,
    /// tripping to OPEN at `fail_threshold`. HALF_OPEN trips straight back
    /// to OPEN on any single failure (the probe did not recover).
    pub fn record_failure(&self, provider: LlmProvider) {
        let mut states = self.states.lock();
        let entry = states.entry(provider).or_default();
        self.maybe_transition_to_half_open(entry);

        match entry.state {
            CircuitState::Closed => {
                entry.consecutive_failures += 1;
                entry.consecutive_successes = 0;
                if entry.consecutive_failures >= self.fail_threshold {
                    entry.state = CircuitState::Open;
                    entry.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                entry.state = CircuitState::Open;
                entry.opened_at = Some(Instant::now());
                entry.consecutive_failures = self.fail_threshold;
                entry.consecutive_successes = 0;
            }
            CircuitState::Open => {
                entry.opened_at = Some(Instant::now());
            }
        }
    }

    /// Record a successful call. CLOSED resets the failure streak.
    /// HALF_OPEN accumulates successes, closing the circuit at
    /// `success_threshold`.
    pub fn record_success(&self, provider: LlmProvider) {
        let mut states = self.states.lock();
        let entry = states.entry(provider).or_default();
        self.maybe_transition_to_half_open(entry);

        match entry.state {
            CircuitState::Closed => {
                entry.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                entry.consecutive_successes += 1;
                if entry.consecutive_successes >= self.success_threshold {
                    entry.state = CircuitState::Closed;
                    entry.consecutive_failures = 0;
                    entry.consecutive_successes = 0;
                    entry.opened_at = None;
                }
            }
            CircuitState::Open => {
                // A late success racing an in-flight probe; ignore, the
                // next call will observe the half-open transition cleanly.
            }
        }
    }

    /// Force every provider back to CLOSED (used between independent scans
    /// in a long-lived host process, mirroring the Python `reset()`).
    pub fn reset(&self) {
        self.states.lock().clear();
    }

    /// Providers currently OPEN (not yet eligible for half-open probing).
    pub fn get_open_providers(&self) -> Vec<LlmProvider> {
        let mut states = self.states.lock();
        states
            .iter_mut()
            .filter_map(|(provider, state)| {
                self.maybe_transition_to_half_open(state);
                (state.state == CircuitState::Open).then_some(*provider)
            })
            .collect()
    }

    /// `provider -> state` snapshot for diagnostics/reporting.
    pub fn summary(&self) -> HashMap<LlmProvider, CircuitState> {
        let mut states = self.states.lock();
        states
            .iter_mut()
            .map(|(provider, state)| {
                self.maybe_transition_to_half_open(state);
                (*provider, state.state)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_circuit_stays_closed_below_threshold() {
        let breaker = ProviderCircuitBreaker::new(3, Duration::from_secs(300), 1);
        breaker.record_failure(LlmProvider::Openai);
        breaker.record_failure(LlmProvider::Openai);
        assert!(!breaker.is_open(LlmProvider::Openai));
    }

    #[test]
    fn trips_open_at_fail_threshold() {
        let breaker = ProviderCircuitBreaker::new(3, Duration::from_secs(300), 1);
        for _ in 0..3 {
            breaker.record_failure(LlmProvider::Openai);
        }
        assert!(breaker.is_open(LlmProvider::Openai));
    }

    #[test]
    fn success_resets_failure_streak_while_closed() {
        let breaker = ProviderCircuitBreaker::new(3, Duration::from_secs(300), 1);
        breaker.record_failure(LlmProvider::Openai);
        breaker.record_failure(LlmProvider::Openai);
        breaker.record_success(LlmProvider::Openai);
        breaker.record_failure(LlmProvider::Openai);
        breaker.record_failure(LlmProvider::Openai);
        assert!(!breaker.is_open(LlmProvider::Openai));
    }

    #[test]
    fn half_open_recovers_to_closed_after_success_threshold() {
        let breaker = ProviderCircuitBreaker::new(1, Duration::from_millis(20), 1);
        breaker.record_failure(LlmProvider::Anthropic);
        assert!(breaker.is_open(LlmProvider::Anthropic));
        // Wait out open_duration so the next check transitions to half-open.
        std::thread::sleep(Duration::from_millis(30));
        assert!(!breaker.is_open(LlmProvider::Anthropic));
        breaker.record_success(LlmProvider::Anthropic);
        assert!(!breaker.is_open(LlmProvider::Anthropic));
    }

    #[test]
    fn half_open_failure_reopens_circuit() {
        let breaker = ProviderCircuitBreaker::new(1, Duration::from_millis(20), 2);
        breaker.record_failure(LlmProvider::Anthropic);
        assert!(breaker.is_open(LlmProvider::Anthropic));
        // Wait out open_duration so the probe call below lands half-open.
        std::thread::sleep(Duration::from_millis(30));
        assert!(!breaker.is_open(LlmProvider::Anthropic));
        breaker.record_failure(LlmProvider::Anthropic);
        assert!(breaker.is_open(LlmProvider::Anthropic));
    }

    #[test]
    fn get_open_providers_lists_only_open_circuits() {
        let breaker = ProviderCircuitBreaker::new(1, Duration::from_secs(300), 1);
        breaker.record_failure(LlmProvider::Groq);
        let open = breaker.get_open_providers();
        assert_eq!(open, vec![LlmProvider::Groq]);
    }

    #[test]
    fn reset_clears_all_state() {
        let breaker = ProviderCircuitBreaker::new(1, Duration::from_secs(300), 1);
        breaker.record_failure(LlmProvider::Groq);
        breaker.reset();
        assert!(!breaker.is_open(LlmProvider::Groq));
    }
}
