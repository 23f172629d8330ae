//! Per-model circuit breaker.
//!
//! ```text
//! Closed --(threshold consecutive failures within window)--> Open
//! Open --(cooldown elapsed, next call)--> HalfOpen (one trial call)
//! HalfOpen --(trial succeeds)--> Closed
//! HalfOpen --(trial fails)--> Open
//! ```
//!
//! Uses `tokio::time::Instant` so paused-clock tests can drive the cooldown.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub window: Duration,
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Externally visible breaker state for one model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Whether a call may proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// The single half-open trial call
    Trial,
    Rejected { retry_in: Duration },
}

#[derive(Debug, Clone, Copy)]
enum State {
    Closed {
        failures: u32,
        first_failure: Option<Instant>,
    },
    Open {
        until: Instant,
    },
    HalfOpen,
}

impl State {
    fn closed() -> Self {
        State::Closed {
            failures: 0,
            first_failure: None,
        }
    }
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    states: Mutex<HashMap<String, State>>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Decide whether a call to `model` may proceed right now
    pub fn admit(&self, model: &str) -> Admission {
        let now = Instant::now();
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(model.to_string()).or_insert_with(State::closed);
        match *state {
            State::Closed { .. } => Admission::Allowed,
            State::Open { until } if now >= until => {
                info!("Circuit for {} half-open, admitting trial call", model);
                *state = State::HalfOpen;
                Admission::Trial
            }
            State::Open { until } => Admission::Rejected {
                retry_in: until - now,
            },
            // The trial is still in flight
            State::HalfOpen => Admission::Rejected {
                retry_in: Duration::ZERO,
            },
        }
    }

    pub fn record_success(&self, model: &str) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = states.get_mut(model) {
            if matches!(state, State::HalfOpen) {
                info!("Circuit for {} closed after successful trial", model);
            }
            *state = State::closed();
        }
    }

    pub fn record_failure(&self, model: &str) {
        let now = Instant::now();
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(model.to_string()).or_insert_with(State::closed);
        match *state {
            State::Closed {
                failures,
                first_failure,
            } => {
                let in_window = first_failure.is_some_and(|t| now - t <= self.config.window);
                let (failures, first_failure) = if in_window {
                    (failures + 1, first_failure)
                } else {
                    (1, Some(now))
                };
                if failures >= self.config.failure_threshold {
                    warn!(
                        "Circuit for {} opened after {} consecutive failures",
                        model, failures
                    );
                    *state = State::Open {
                        until: now + self.config.cooldown,
                    };
                } else {
                    *state = State::Closed {
                        failures,
                        first_failure,
                    };
                }
            }
            State::HalfOpen => {
                warn!("Trial call for {} failed, circuit reopened", model);
                *state = State::Open {
                    until: now + self.config.cooldown,
                };
            }
            State::Open { .. } => {}
        }
    }

    /// Release a trial slot whose call ended without a verdict (cancelled)
    pub fn record_abandoned(&self, model: &str) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = states.get_mut(model) {
            if matches!(state, State::HalfOpen) {
                *state = State::Open {
                    until: Instant::now(),
                };
            }
        }
    }

    pub fn state(&self, model: &str) -> CircuitState {
        let states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        match states.get(model) {
            None | Some(State::Closed { .. }) => CircuitState::Closed,
            Some(State::Open { .. }) => CircuitState::Open,
            Some(State::HalfOpen) => CircuitState::HalfOpen,
        }
    }
}
