//! Failure isolation around the Model Gateway port.
//!
//! - [`CircuitBreaker`]: per-model closed/open/half-open state
//! - [`GuardedGateway`]: concurrency ceiling, per-call timeout, breaker,
//!   usage accounting, and cooperative cancellation around any adapter
//! - [`RateLimiter`]: per-client sliding-window budget for inbound requests

pub mod circuit_breaker;
pub mod guarded_gateway;
pub mod rate_limiter;

pub use circuit_breaker::{Admission, BreakerConfig, CircuitBreaker, CircuitState};
pub use guarded_gateway::GuardedGateway;
pub use rate_limiter::{RateDecision, RateLimiter};
