//! Application-level configuration.
//!
//! This module provides the runtime configuration types that control how use
//! cases behave:
//!
//! - [`GatewayParams`]: concurrency ceiling, per-call timeout, circuit breaker
//! - [`ClassifierParams`]: classifier call shape and cache TTL
//! - [`TimeTravelParams`]: snapshot count, stage timeouts, stream tuning
//! - [`RateLimitParams`]: per-client sliding-window request budget
//! - [`EnsembleConfig`]: container for the above plus the model slots

pub mod ensemble_config;
pub mod params;

pub use ensemble_config::{ConfigError, EnsembleConfig, ModelSlots};
pub use params::{ClassifierParams, GatewayParams, RateLimitParams, TimeTravelParams};
