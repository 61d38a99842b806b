//! Circuit breaker implementation for preventing cascading failures
//!
//! Consecutive failures open the circuit; after a cooldown exactly one
//! probe request is admitted. The probe's outcome decides whether the
//! circuit closes again or reopens for another cooldown.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Why a request was rejected by the breaker.
#[derive(Debug, Error)]
pub enum BreakerError {
    #[error("circuit '{name}' is open, retry in {retry_in_secs}s")]
    Open { name: String, retry_in_secs: u64 },

    #[error("circuit '{name}' is half-open with a probe in flight")]
    Probing { name: String },
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before the circuit opens
    pub failure_threshold: usize,

    /// Cooldown before a single probe request is admitted
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// A thread-safe circuit breaker.
///
/// While half-open, exactly one caller is admitted as the probe; all
/// other callers are rejected until that probe settles.
pub struct CircuitBreaker {
    /// Name of the guarded dependency, used in errors and logs
    name: String,

    /// Current circuit state
    state: RwLock<CircuitState>,

    /// Time when the circuit was opened
    opened_at: RwLock<Option<Instant>>,

    /// Count of consecutive failures in closed state
    failure_count: AtomicUsize,

    /// Whether the half-open probe slot is taken
    probe_in_flight: AtomicBool,

    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(CircuitState::Closed),
            opened_at: RwLock::new(None),
            failure_count: AtomicUsize::new(0),
            probe_in_flight: AtomicBool::new(false),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether a request may proceed. Callers that get `Ok(())`
    /// must later report the result via `record_success` or
    /// `record_failure`.
    pub fn check(&self) -> Result<(), BreakerError> {
        match self.state() {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let remaining = {
                    let opened_at = self.opened_at.read().unwrap();
                    match *opened_at {
                        Some(instant) => self.config.cooldown.checked_sub(instant.elapsed()),
                        None => None,
                    }
                };

                match remaining {
                    Some(left) if !left.is_zero() => Err(BreakerError::Open {
                        name: self.name.clone(),
                        retry_in_secs: left.as_secs().max(1),
                    }),
                    _ => {
                        // Cooldown elapsed; racing callers all reach this
                        // point, so the probe slot decides who goes
                        self.transition_to_half_open();
                        if self
                            .probe_in_flight
                            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                            .is_ok()
                        {
                            Ok(())
                        } else {
                            Err(BreakerError::Probing {
                                name: self.name.clone(),
                            })
                        }
                    }
                }
            }
            CircuitState::HalfOpen => {
                // One probe only; everyone else waits for its outcome
                if self
                    .probe_in_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    Ok(())
                } else {
                    Err(BreakerError::Probing {
                        name: self.name.clone(),
                    })
                }
            }
        }
    }

    /// Record a successful request
    pub fn record_success(&self) {
        match self.state() {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                // Probe succeeded, the dependency has recovered
                self.close_circuit();
            }
            CircuitState::Open => {
                log::warn!("Circuit '{}' received success while open, ignoring", self.name);
            }
        }
    }

    /// Record a failed request
    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.failure_threshold {
                    self.open_circuit();
                }
            }
            CircuitState::HalfOpen => {
                // Probe failed, back to a full cooldown
                self.open_circuit();
            }
            CircuitState::Open => {
                log::debug!("Circuit '{}' received failure while open, ignoring", self.name);
            }
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        *self.state.write().unwrap() = CircuitState::Closed;
        *self.opened_at.write().unwrap() = None;
        self.failure_count.store(0, Ordering::SeqCst);
        self.probe_in_flight.store(false, Ordering::SeqCst);
    }

    /// Get the current circuit state
    pub fn state(&self) -> CircuitState {
        *self.state.read().unwrap()
    }

    /// Get the current number of consecutive failures
    pub fn failure_count(&self) -> usize {
        self.failure_count.load(Ordering::SeqCst)
    }

    fn open_circuit(&self) {
        log::warn!("Circuit '{}' transitioning to Open", self.name);
        *self.state.write().unwrap() = CircuitState::Open;
        *self.opened_at.write().unwrap() = Some(Instant::now());
        self.probe_in_flight.store(false, Ordering::SeqCst);
    }

    fn close_circuit(&self) {
        log::info!("Circuit '{}' transitioning to Closed", self.name);
        *self.state.write().unwrap() = CircuitState::Closed;
        *self.opened_at.write().unwrap() = None;
        self.failure_count.store(0, Ordering::SeqCst);
        self.probe_in_flight.store(false, Ordering::SeqCst);
    }

    // Idempotent so racing callers past the cooldown can all take it.
    // `open_circuit` already cleared the probe slot; resetting it here
    // would hand a second racer a probe of its own.
    fn transition_to_half_open(&self) {
        let mut state = self.state.write().unwrap();
        if *state != CircuitState::HalfOpen {
            log::info!("Circuit '{}' transitioning to Half-Open", self.name);
            *state = CircuitState::HalfOpen;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn breaker(threshold: usize, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                cooldown: Duration::from_millis(cooldown_ms),
            },
        )
    }

    #[test]
    fn test_circuit_closed_initially() {
        let cb = breaker(5, 100);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.check().is_ok());
    }

    #[test]
    fn test_circuit_opens_after_consecutive_failures() {
        let cb = breaker(3, 100);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(matches!(cb.check(), Err(BreakerError::Open { .. })));
    }

    #[test]
    fn test_success_resets_consecutive_count() {
        let cb = breaker(3, 100);

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_single_probe_after_cooldown() {
        let cb = breaker(1, 50);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        thread::sleep(Duration::from_millis(80));

        // First caller after cooldown is the probe
        assert!(cb.check().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // Second caller is rejected while the probe is in flight
        assert!(matches!(cb.check(), Err(BreakerError::Probing { .. })));
    }

    #[test]
    fn test_cooldown_admits_exactly_one_probe_under_contention() {
        use std::sync::{Arc, Barrier};

        for _ in 0..200 {
            let cb = Arc::new(breaker(1, 1));
            cb.record_failure();
            assert_eq!(cb.state(), CircuitState::Open);
            thread::sleep(Duration::from_millis(3));

            let admitted = Arc::new(AtomicUsize::new(0));
            let barrier = Arc::new(Barrier::new(4));
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let cb = cb.clone();
                    let admitted = admitted.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        if cb.check().is_ok() {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(
                admitted.load(Ordering::SeqCst),
                1,
                "more than one caller admitted as the half-open probe"
            );
            assert_eq!(cb.state(), CircuitState::HalfOpen);
        }
    }

    #[test]
    fn test_probe_success_closes_circuit() {
        let cb = breaker(1, 50);
        cb.record_failure();
        thread::sleep(Duration::from_millis(80));

        assert!(cb.check().is_ok());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.check().is_ok());
    }

    #[test]
    fn test_probe_failure_reopens_circuit() {
        let cb = breaker(1, 50);
        cb.record_failure();
        thread::sleep(Duration::from_millis(80));

        assert!(cb.check().is_ok());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.check().is_err());
    }

    #[test]
    fn test_reset() {
        let cb = breaker(1, 10_000);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.check().is_ok());
    }
}
