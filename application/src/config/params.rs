//! Runtime parameters for the gateway, classifier, time-travel stages and
//! the per-client rate limit.
//!
//! These are application-layer concerns, not domain policy. Raw TOML values
//! are converted into these types by the infrastructure config loader.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Model Gateway limits.
///
/// The breaker opens after `breaker_failure_threshold` consecutive failures
/// that all fall inside `breaker_window`, and stays open for
/// `breaker_cooldown` before admitting one trial call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayParams {
    /// Maximum model calls in flight across all requests.
    pub max_concurrent_calls: usize,
    /// Deadline for a single call unless the request overrides it.
    pub call_timeout: Duration,
    pub breaker_failure_threshold: u32,
    pub breaker_window: Duration,
    pub breaker_cooldown: Duration,
}

impl Default for GatewayParams {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 5,
            call_timeout: Duration::from_secs(30),
            breaker_failure_threshold: 5,
            breaker_window: Duration::from_secs(60),
            breaker_cooldown: Duration::from_secs(30),
        }
    }
}

impl GatewayParams {
    // ==================== Builder Methods ====================

    pub fn with_max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = max;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_breaker(mut self, threshold: u32, window: Duration, cooldown: Duration) -> Self {
        self.breaker_failure_threshold = threshold;
        self.breaker_window = window;
        self.breaker_cooldown = cooldown;
        self
    }
}

/// Classifier call shape and cache lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    pub cache_ttl: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            max_tokens: 300,
            temperature: 0.1,
            timeout: Duration::from_secs(10),
        }
    }
}

impl ClassifierParams {
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Time-travel orchestration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeTravelParams {
    pub enabled: bool,
    /// Upper bound on time points, today included.
    pub max_snapshots: usize,
    pub snapshot_timeout: Duration,
    /// Checked between stages; calls already issued finish under their own timeouts.
    pub request_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Pending events the stream holds before heartbeats are dropped.
    pub stream_buffer: usize,
    pub snapshot_temperature: f32,
    pub narrative_max_tokens: u32,
    pub key_changes_max_tokens: u32,
}

impl Default for TimeTravelParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max_snapshots: 4,
            snapshot_timeout: Duration::from_secs(45),
            request_timeout: Duration::from_secs(120),
            heartbeat_interval: Duration::from_secs(5),
            stream_buffer: 64,
            snapshot_temperature: 0.5,
            narrative_max_tokens: 800,
            key_changes_max_tokens: 600,
        }
    }
}

impl TimeTravelParams {
    pub fn with_max_snapshots(mut self, max: usize) -> Self {
        self.max_snapshots = max;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_stream_buffer(mut self, size: usize) -> Self {
        self.stream_buffer = size;
        self
    }
}

/// Per-client request budget for the model-calling endpoints.
///
/// A client may start `max_requests` requests in any trailing `window`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitParams {
    pub enabled: bool,
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitParams {
    pub fn with_budget(mut self, max_requests: u32, window: Duration) -> Self {
        self.max_requests = max_requests;
        self.window = window;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_defaults() {
        let params = GatewayParams::default();
        assert_eq!(params.max_concurrent_calls, 5);
        assert_eq!(params.breaker_failure_threshold, 5);
        assert_eq!(params.breaker_cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_builders() {
        let params = GatewayParams::default()
            .with_max_concurrent_calls(2)
            .with_call_timeout(Duration::from_secs(3));
        assert_eq!(params.max_concurrent_calls, 2);
        assert_eq!(params.call_timeout, Duration::from_secs(3));

        let tt = TimeTravelParams::default().with_max_snapshots(2);
        assert_eq!(tt.max_snapshots, 2);
        assert!(tt.enabled);

        let limits = RateLimitParams::default().with_budget(5, Duration::from_secs(10));
        assert_eq!((limits.max_requests, limits.window), (5, Duration::from_secs(10)));
        assert!(!limits.disabled().enabled);
    }
}
