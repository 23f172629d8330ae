//! Domain layer for llm-ensemble
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Ensemble
//!
//! A question is sent to several models in parallel and the answers are
//! optionally merged by a synthesis model.
//!
//! ## Routing
//!
//! A cheap classifier call grades the question (complexity, intent, domain,
//! temporal scope) and the [`RoutingPolicy`] picks the smallest set of models
//! that can answer it well.
//!
//! ## Time travel
//!
//! Time-sensitive questions are answered "as of" several historical dates,
//! and the answers are compared into an evolution narrative. Progress is
//! reported as a stream of [`StreamEvent`]s.

pub mod classification;
pub mod core;
pub mod cost;
pub mod ensemble;
pub mod prompt;
pub mod routing;
pub mod stream;
pub mod time_travel;

// Re-export commonly used types
pub use classification::{
    entities::{Classification, Complexity, Intent, QueryDomain, TemporalScope, TemporalSignal},
    parsing::{ClassificationParseError, parse_classification},
    temporal::detect_temporal,
};
pub use core::{error::DomainError, model::Model, model::ModelTier, question::Question};
pub use cost::{
    estimate::{CostBreakdown, CostEstimate, Savings, estimate_cost, estimate_time},
    pricing::{TokenUsage, calculate_cost},
};
pub use ensemble::value_objects::{CallErrorKind, EnsembleResult, ModelCallResult, duration_ms};
pub use prompt::PromptTemplate;
pub use routing::{
    decision::RoutingDecision,
    policy::{RouteOverrides, RoutingPolicy},
};
pub use stream::event::{CompleteSummary, StreamEvent, StreamFrame, TimingReport, TransitionChanges};
pub use time_travel::{
    entities::{
        ChangeVelocity, Narrative, Snapshot, StageTimings, TimeTravelResult, TimeTravelStage,
    },
    sensitivity::{SensitivityLevel, TemporalSensitivity, classify_sensitivity},
    time_point::{TimePoint, identify_time_points},
};
