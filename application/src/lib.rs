//! Application layer for llm-ensemble
//!
//! This crate contains use cases, port definitions, resilience wrappers and
//! runtime configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod resilience;
pub mod service;
pub mod stats;
pub mod use_cases;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{
    ClassifierParams, ConfigError, EnsembleConfig, GatewayParams, ModelSlots, RateLimitParams,
    TimeTravelParams,
};
pub use ports::{
    model_gateway::{Completion, CompletionRequest, GatewayError, ModelGateway},
    progress::{NoProgress, TimeTravelProgress},
    query_logger::{NoQueryLogger, QueryEvent, QueryLogger},
    web_search::{SearchError, SearchResult, WebSearch},
};
pub use resilience::{CircuitState, GuardedGateway, RateDecision, RateLimiter};
pub use service::{EnsembleService, HealthReport, ModelHealth, ModelInfo, ServiceError, ServiceStats};
pub use stats::{
    AlertReport, LatencyBreakdown, LatencyMetrics, LatencyReport, RoutingStatsSnapshot,
    UsageSnapshot,
};
pub use use_cases::classify_query::{CacheStats, ClassifyOutput, ClassifyQueryUseCase};
pub use use_cases::route_and_answer::{
    ExecutionMetrics, RouteAndAnswerInput, RouteAndAnswerOutput, RouteAndAnswerUseCase,
};
pub use use_cases::run_ensemble::{
    RunEnsembleError, RunEnsembleInput, RunEnsembleUseCase, SynthesizeInput,
};
pub use use_cases::run_time_travel::{RunTimeTravelUseCase, TimeTravelInput};
pub use use_cases::stream_time_travel::{
    EventQueue, StreamTimeTravelUseCase, TimeTravelStream, complete_summary, timing_report,
};
