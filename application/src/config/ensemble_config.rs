//! Ensemble configuration container.
//!
//! [`EnsembleConfig`] groups the model slots and the per-stage parameter
//! types. Use cases receive only the slices they need; the service holds the
//! whole container.

use super::params::{ClassifierParams, GatewayParams, RateLimitParams, TimeTravelParams};
use ensemble_domain::{Model, ModelTier, RoutingPolicy};
use std::time::Duration;
use thiserror::Error;

/// Configuration rejected before start-up
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} is out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

/// Which model fills each role
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSlots {
    /// Called for complex questions and by the plain ensemble endpoint
    pub ensemble: Vec<Model>,
    pub synthesis: Model,
    pub classifier: Model,
    /// Cheap model for key-change extraction and simple questions
    pub fast: Model,
}

impl Default for ModelSlots {
    fn default() -> Self {
        Self {
            ensemble: Model::default_ensemble(),
            synthesis: Model::default_synthesis(),
            classifier: Model::default_fast(),
            fast: Model::default_fast(),
        }
    }
}

impl ModelSlots {
    /// First balanced-tier ensemble member, else the synthesis model
    pub fn balanced(&self) -> Model {
        self.ensemble
            .iter()
            .find(|m| m.tier() == ModelTier::Balanced)
            .cloned()
            .unwrap_or_else(|| self.synthesis.clone())
    }
}

/// Full runtime configuration for an [`EnsembleService`](crate::EnsembleService)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnsembleConfig {
    pub models: ModelSlots,
    pub gateway: GatewayParams,
    pub classifier: ClassifierParams,
    pub time_travel: TimeTravelParams,
    pub rate_limit: RateLimitParams,
}

impl EnsembleConfig {
    pub fn with_models(mut self, models: ModelSlots) -> Self {
        self.models = models;
        self
    }

    pub fn with_gateway(mut self, gateway: GatewayParams) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifierParams) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_time_travel(mut self, time_travel: TimeTravelParams) -> Self {
        self.time_travel = time_travel;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitParams) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Routing policy built from the configured model slots
    pub fn routing_policy(&self) -> RoutingPolicy {
        RoutingPolicy {
            fast: self.models.fast.clone(),
            balanced: self.models.balanced(),
            ensemble: self.models.ensemble.clone(),
            synthesis: self.models.synthesis.clone(),
            ..RoutingPolicy::default()
        }
    }

    /// Reject values that would make the service unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.ensemble.is_empty() {
            return Err(ConfigError::Empty("models.ensemble"));
        }
        let named = self
            .models
            .ensemble
            .iter()
            .chain([&self.models.synthesis, &self.models.classifier, &self.models.fast]);
        for model in named {
            if model.as_str().trim().is_empty() {
                return Err(ConfigError::Empty("model name"));
            }
        }

        if self.gateway.max_concurrent_calls == 0 {
            return Err(ConfigError::Zero("gateway.max_concurrent_calls"));
        }
        if self.gateway.breaker_failure_threshold == 0 {
            return Err(ConfigError::Zero("gateway.breaker_failure_threshold"));
        }

        let timeouts = [
            ("gateway.call_timeout_seconds", self.gateway.call_timeout),
            ("gateway.breaker_cooldown_seconds", self.gateway.breaker_cooldown),
            ("classifier.timeout_seconds", self.classifier.timeout),
            ("time_travel.snapshot_timeout_seconds", self.time_travel.snapshot_timeout),
            ("time_travel.request_timeout_seconds", self.time_travel.request_timeout),
            ("time_travel.heartbeat_interval_seconds", self.time_travel.heartbeat_interval),
        ];
        for (field, value) in timeouts {
            if value == Duration::ZERO {
                return Err(ConfigError::Zero(field));
            }
        }

        if self.time_travel.max_snapshots < 2 {
            return Err(ConfigError::OutOfRange {
                field: "time_travel.max_snapshots",
                reason: "at least 2 snapshots are needed to compare".to_string(),
            });
        }
        if self.rate_limit.enabled {
            if self.rate_limit.max_requests == 0 {
                return Err(ConfigError::Zero("rate_limit.max_requests"));
            }
            if self.rate_limit.window == Duration::ZERO {
                return Err(ConfigError::Zero("rate_limit.window_seconds"));
            }
        }
        if self.time_travel.stream_buffer == 0 {
            return Err(ConfigError::Zero("time_travel.stream_buffer"));
        }
        if !(0.0..=2.0).contains(&self.classifier.temperature) {
            return Err(ConfigError::OutOfRange {
                field: "classifier.temperature",
                reason: format!("{} is not within 0.0..=2.0", self.classifier.temperature),
            });
        }
        Ok(())
    }
}
