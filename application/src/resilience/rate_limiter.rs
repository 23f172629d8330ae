//! Per-client sliding-window rate limiter.
//!
//! Each client keeps the start times of its requests inside the trailing
//! window. A request is admitted while fewer than `max_requests` remain in
//! the window; rejected requests are not recorded.
//!
//! Uses `tokio::time::Instant` so paused-clock tests can slide the window.

use crate::config::RateLimitParams;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Outcome of [`RateLimiter::check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

struct Windows {
    clients: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

pub struct RateLimiter {
    params: RateLimitParams,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(params: RateLimitParams) -> Self {
        Self {
            params,
            windows: Mutex::new(Windows {
                clients: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn params(&self) -> &RateLimitParams {
        &self.params
    }

    /// Admit and record one request from `client`, or say when to retry
    pub fn check(&self, client: &str) -> RateDecision {
        if !self.params.enabled {
            return RateDecision::Allowed {
                remaining: self.params.max_requests,
            };
        }

        let now = Instant::now();
        let window = self.params.window;
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        if now.duration_since(windows.last_sweep) >= window {
            windows
                .clients
                .retain(|_, requests| requests.back().is_some_and(|t| now.duration_since(*t) < window));
            windows.last_sweep = now;
        }

        let requests = windows.clients.entry(client.to_string()).or_default();
        expire(requests, now, window);

        let used = u32::try_from(requests.len()).unwrap_or(u32::MAX);
        if used >= self.params.max_requests {
            let retry_after_secs = requests
                .front()
                .map(|oldest| retry_after(window.saturating_sub(now.duration_since(*oldest))))
                .unwrap_or(1);
            warn!("Rate limit exceeded for {}", client);
            return RateDecision::Limited { retry_after_secs };
        }

        requests.push_back(now);
        let remaining = self.params.max_requests - used - 1;
        debug!("Admitted request from {} ({} left in window)", client, remaining);
        RateDecision::Allowed { remaining }
    }

    /// Requests `client` may still start in the current window
    pub fn remaining(&self, client: &str) -> u32 {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        match windows.clients.get_mut(client) {
            Some(requests) => {
                expire(requests, now, self.params.window);
                let used = u32::try_from(requests.len()).unwrap_or(u32::MAX);
                self.params.max_requests.saturating_sub(used)
            }
            None => self.params.max_requests,
        }
    }

    pub fn reset(&self, client: &str) {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clients
            .remove(client);
    }

    pub fn clear(&self) {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clients
            .clear();
    }

    /// Clients currently holding at least one request in their window
    pub fn tracked_clients(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clients
            .len()
    }
}

fn expire(requests: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while requests.front().is_some_and(|t| now.duration_since(*t) >= window) {
        requests.pop_front();
    }
}

/// Whole seconds, rounded up and never zero
fn retry_after(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}
