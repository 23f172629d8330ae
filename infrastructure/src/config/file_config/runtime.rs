//! Gateway, classifier, time-travel and rate-limit tuning from TOML
//! (`[gateway]`, `[classifier]`, `[time_travel]`, `[rate_limit]` sections)
//!
//! Durations are whole seconds in the file and become `Duration`s in the
//! application parameter types.

use ensemble_application::{ClassifierParams, GatewayParams, RateLimitParams, TimeTravelParams};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGatewayConfig {
    pub max_concurrent_calls: usize,
    pub call_timeout_seconds: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_window_seconds: u64,
    pub breaker_cooldown_seconds: u64,
}

impl Default for FileGatewayConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 5,
            call_timeout_seconds: 30,
            breaker_failure_threshold: 5,
            breaker_window_seconds: 60,
            breaker_cooldown_seconds: 30,
        }
    }
}

impl FileGatewayConfig {
    pub fn to_params(&self) -> GatewayParams {
        GatewayParams::default()
            .with_max_concurrent_calls(self.max_concurrent_calls)
            .with_call_timeout(Duration::from_secs(self.call_timeout_seconds))
            .with_breaker(
                self.breaker_failure_threshold,
                Duration::from_secs(self.breaker_window_seconds),
                Duration::from_secs(self.breaker_cooldown_seconds),
            )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileClassifierConfig {
    pub cache_ttl_seconds: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for FileClassifierConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 86_400,
            max_tokens: 300,
            temperature: 0.1,
            timeout_seconds: 10,
        }
    }
}

impl FileClassifierConfig {
    pub fn to_params(&self) -> ClassifierParams {
        ClassifierParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            ..ClassifierParams::default()
        }
        .with_cache_ttl(Duration::from_secs(self.cache_ttl_seconds))
        .with_timeout(Duration::from_secs(self.timeout_seconds))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTimeTravelConfig {
    pub enabled: bool,
    pub max_snapshots: usize,
    pub snapshot_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub heartbeat_interval_seconds: u64,
    pub stream_buffer: usize,
}

impl Default for FileTimeTravelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_snapshots: 4,
            snapshot_timeout_seconds: 45,
            request_timeout_seconds: 120,
            heartbeat_interval_seconds: 5,
            stream_buffer: 64,
        }
    }
}

impl FileTimeTravelConfig {
    pub fn to_params(&self) -> TimeTravelParams {
        TimeTravelParams {
            enabled: self.enabled,
            snapshot_timeout: Duration::from_secs(self.snapshot_timeout_seconds),
            ..TimeTravelParams::default()
        }
        .with_max_snapshots(self.max_snapshots)
        .with_request_timeout(Duration::from_secs(self.request_timeout_seconds))
        .with_heartbeat_interval(Duration::from_secs(self.heartbeat_interval_seconds))
        .with_stream_buffer(self.stream_buffer)
    }
}

/// Per-client budget on the model-calling HTTP endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl Default for FileRateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 60,
            window_seconds: 60,
        }
    }
}

impl FileRateLimitConfig {
    pub fn to_params(&self) -> RateLimitParams {
        RateLimitParams {
            enabled: self.enabled,
            ..RateLimitParams::default()
        }
        .with_budget(self.max_requests, Duration::from_secs(self.window_seconds))
    }
}
