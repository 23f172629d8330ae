//! Explicitly owned application context
//!
//! [`EnsembleService`] builds every use case from one [`EnsembleConfig`] and
//! shares a single guarded gateway, usage counter, routing history and
//! latency collector between them. The transport layer holds it behind an
//! `Arc` and consults its rate limiter before admitting model-calling
//! requests.

use crate::config::{ConfigError, EnsembleConfig};
use crate::ports::model_gateway::ModelGateway;
use crate::ports::query_logger::QueryLogger;
use crate::ports::web_search::WebSearch;
use crate::resilience::{CircuitState, GuardedGateway, RateLimiter};
use crate::stats::{
    LatencyMetrics, RoutingStats, RoutingStatsSnapshot, UsageSnapshot, UsageStats,
};
use crate::use_cases::classify_query::{CacheStats, ClassifyQueryUseCase};
use crate::use_cases::route_and_answer::RouteAndAnswerUseCase;
use crate::use_cases::run_ensemble::RunEnsembleUseCase;
use crate::use_cases::run_time_travel::{RunTimeTravelUseCase, TimeTravelInput};
use crate::use_cases::stream_time_travel::{StreamTimeTravelUseCase, TimeTravelStream};
use ensemble_domain::cost::estimate::baseline_cost;
use ensemble_domain::cost::pricing::{ModelPricing, pricing_for};
use ensemble_domain::{Model, ModelTier};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("time travel is disabled in configuration")]
    TimeTravelDisabled,
}

/// Usage counters plus classifier cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    #[serde(flatten)]
    pub usage: UsageSnapshot,
    pub classification_cache: CacheStats,
}

/// One catalogue entry for the models listing
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub tier: ModelTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<ModelPricing>,
    pub in_default_ensemble: bool,
    pub is_synthesis: bool,
    pub is_classifier: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelHealth {
    pub model: String,
    pub circuit: CircuitState,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// "healthy", or "degraded" while any breaker is not closed
    pub status: &'static str,
    pub models: Vec<ModelHealth>,
    pub available_call_slots: usize,
    pub time_travel_enabled: bool,
    pub search_enabled: bool,
}

pub struct EnsembleService<G: ModelGateway + 'static> {
    config: EnsembleConfig,
    gateway: Arc<GuardedGateway<G>>,
    usage: Arc<UsageStats>,
    routing_stats: Arc<RoutingStats>,
    latency: Arc<LatencyMetrics>,
    rate_limiter: RateLimiter,
    classifier: Arc<ClassifyQueryUseCase<G>>,
    ensemble: Arc<RunEnsembleUseCase<G>>,
    route_and_answer: RouteAndAnswerUseCase<G>,
    time_travel: Arc<RunTimeTravelUseCase<G>>,
    stream: StreamTimeTravelUseCase<G>,
    search_enabled: bool,
}

impl<G: ModelGateway + 'static> EnsembleService<G> {
    pub fn new(
        gateway: Arc<G>,
        config: EnsembleConfig,
        web_search: Option<Arc<dyn WebSearch>>,
        logger: Arc<dyn QueryLogger>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let usage = Arc::new(UsageStats::new());
        let routing_stats = Arc::new(RoutingStats::new());
        let latency = Arc::new(LatencyMetrics::new());
        let guarded = Arc::new(GuardedGateway::new(gateway, &config.gateway, Arc::clone(&usage)));
        let models = &config.models;

        let classifier = Arc::new(ClassifyQueryUseCase::new(
            Arc::clone(&guarded),
            models.classifier.clone(),
            config.classifier.clone(),
            models.ensemble.clone(),
        ));
        let ensemble = Arc::new(RunEnsembleUseCase::new(
            Arc::clone(&guarded),
            Arc::clone(&usage),
            Arc::clone(&routing_stats),
            Arc::clone(&logger),
            baseline_cost(&models.ensemble, &models.synthesis),
        )
        .with_latency(Arc::clone(&latency)));
        let search_enabled = web_search.is_some();
        let route_and_answer = RouteAndAnswerUseCase::new(
            Arc::clone(&classifier),
            config.routing_policy(),
            Arc::clone(&ensemble),
            web_search,
            Arc::clone(&logger),
        )
        .with_latency(Arc::clone(&latency));
        let time_travel = Arc::new(RunTimeTravelUseCase::new(
            Arc::clone(&guarded),
            config.time_travel.clone(),
            models.fast.clone(),
            models.synthesis.clone(),
            Arc::clone(&usage),
            logger,
        )
        .with_latency(Arc::clone(&latency)));
        let stream = StreamTimeTravelUseCase::new(Arc::clone(&time_travel));

        info!(
            "Ensemble service ready: ensemble=[{}], synthesis={}, search={}",
            models
                .ensemble
                .iter()
                .map(Model::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            models.synthesis,
            search_enabled
        );

        let rate_limiter = RateLimiter::new(config.rate_limit.clone());

        Ok(Self {
            config,
            gateway: guarded,
            usage,
            routing_stats,
            latency,
            rate_limiter,
            classifier,
            ensemble,
            route_and_answer,
            time_travel,
            stream,
            search_enabled,
        })
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn ensemble(&self) -> &RunEnsembleUseCase<G> {
        &self.ensemble
    }

    pub fn route_and_answer(&self) -> &RouteAndAnswerUseCase<G> {
        &self.route_and_answer
    }

    pub fn time_travel(&self) -> Result<&RunTimeTravelUseCase<G>, ServiceError> {
        self.ensure_time_travel()?;
        Ok(&self.time_travel)
    }

    /// Start a streaming time-travel run; dropping the stream cancels it
    pub fn stream_time_travel(&self, input: TimeTravelInput) -> Result<TimeTravelStream, ServiceError> {
        self.ensure_time_travel()?;
        Ok(self.stream.start(input))
    }

    fn ensure_time_travel(&self) -> Result<(), ServiceError> {
        if self.config.time_travel.enabled {
            Ok(())
        } else {
            Err(ServiceError::TimeTravelDisabled)
        }
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            usage: self.usage.snapshot(),
            classification_cache: self.classifier.cache().stats(),
        }
    }

    pub fn router_stats(&self) -> RoutingStatsSnapshot {
        self.routing_stats.snapshot()
    }

    pub fn latency(&self) -> &LatencyMetrics {
        &self.latency
    }

    /// Per-client budget for the model-calling endpoints
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Empty the classification cache, returning how many entries were dropped
    pub fn clear_cache(&self) -> usize {
        let cleared = self.classifier.cache().clear();
        info!("Cleared {} cached classifications", cleared);
        cleared
    }

    /// The built-in catalogue plus any custom models in use
    pub fn models(&self) -> Vec<ModelInfo> {
        let slots = &self.config.models;
        let mut models: Vec<Model> = Model::CATALOGUE.to_vec();
        for model in slots.ensemble.iter().chain([&slots.synthesis, &slots.classifier, &slots.fast]) {
            if !models.contains(model) {
                models.push(model.clone());
            }
        }

        models
            .into_iter()
            .map(|model| ModelInfo {
                id: model.as_str().to_string(),
                name: model.display_name().to_string(),
                tier: model.tier(),
                pricing: pricing_for(&model),
                in_default_ensemble: slots.ensemble.contains(&model),
                is_synthesis: slots.synthesis == model,
                is_classifier: slots.classifier == model,
            })
            .collect()
    }

    pub fn health(&self) -> HealthReport {
        let slots = &self.config.models;
        let mut watched: Vec<&Model> = Vec::new();
        for model in slots.ensemble.iter().chain([&slots.synthesis, &slots.classifier, &slots.fast]) {
            if !watched.contains(&model) {
                watched.push(model);
            }
        }

        let models: Vec<ModelHealth> = watched
            .into_iter()
            .map(|model| ModelHealth {
                model: model.as_str().to_string(),
                circuit: self.gateway.circuit_state(model.as_str()),
            })
            .collect();
        let degraded = models.iter().any(|m| m.circuit != CircuitState::Closed);

        HealthReport {
            status: if degraded { "degraded" } else { "healthy" },
            models,
            available_call_slots: self.gateway.available_slots(),
            time_travel_enabled: self.config.time_travel.enabled,
            search_enabled: self.search_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelSlots, RateLimitParams, TimeTravelParams};
    use crate::resilience::RateDecision;
    use crate::ports::model_gateway::GatewayError;
    use crate::ports::query_logger::NoQueryLogger;
    use crate::testing::ScriptedGateway;
    use crate::use_cases::run_ensemble::RunEnsembleInput;
    use ensemble_domain::Question;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn service(gateway: ScriptedGateway, config: EnsembleConfig) -> EnsembleService<ScriptedGateway> {
        EnsembleService::new(Arc::new(gateway), config, None, Arc::new(NoQueryLogger)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = EnsembleConfig::default().with_models(ModelSlots {
            ensemble: Vec::new(),
            ..ModelSlots::default()
        });
        let result = EnsembleService::new(
            Arc::new(ScriptedGateway::new()),
            config,
            None,
            Arc::new(NoQueryLogger),
        );
        assert!(matches!(result, Err(ConfigError::Empty(_))));
    }

    #[test]
    fn test_models_listing() {
        let svc = service(ScriptedGateway::new(), EnsembleConfig::default());
        let models = svc.models();
        assert_eq!(models.len(), 4);
        let mini = models.iter().find(|m| m.id == "gpt-4o-mini").unwrap();
        assert!(mini.in_default_ensemble);
        assert!(mini.is_classifier);
        assert!(mini.pricing.is_some());
        let flagship = models.iter().find(|m| m.id == "gpt-5.2").unwrap();
        assert!(!flagship.in_default_ensemble);
        assert_eq!(flagship.tier, ModelTier::Flagship);
    }

    #[test]
    fn test_custom_model_is_listed_unpriced() {
        let config = EnsembleConfig::default().with_models(ModelSlots {
            ensemble: vec![Model::Gpt4o, Model::from("local-llama")],
            ..ModelSlots::default()
        });
        let svc = service(ScriptedGateway::new(), config);
        let custom = svc.models().into_iter().find(|m| m.id == "local-llama").unwrap();
        assert!(custom.pricing.is_none());
        assert!(custom.in_default_ensemble);
    }

    #[test]
    fn test_time_travel_can_be_disabled() {
        let config = EnsembleConfig::default().with_time_travel(TimeTravelParams {
            enabled: false,
            ..TimeTravelParams::default()
        });
        let svc = service(ScriptedGateway::new(), config);
        assert!(!svc.health().time_travel_enabled);
        assert_eq!(svc.time_travel().err(), Some(ServiceError::TimeTravelDisabled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_and_health_after_failures() {
        let gateway = ScriptedGateway::new()
            .reply(Model::Gpt4o, "fine")
            .fail(Model::Gpt4Turbo, GatewayError::Transport("reset".into()));
        let svc = service(gateway, EnsembleConfig::default());
        assert_eq!(svc.health().status, "healthy");

        for _ in 0..5 {
            let input = RunEnsembleInput::new(
                Question::new("What is Rust?").unwrap(),
                vec![Model::Gpt4Turbo, Model::Gpt4o],
            );
            svc.ensemble().execute(input, &CancellationToken::new()).await.unwrap();
        }

        let stats = svc.stats();
        assert_eq!(stats.usage.total_queries, 5);
        assert_eq!(stats.usage.failed_calls, 5);
        assert_eq!(svc.router_stats().total_queries, 5);

        let health = svc.health();
        assert_eq!(health.status, "degraded");
        let turbo = health.models.iter().find(|m| m.model == "gpt-4-turbo").unwrap();
        assert_eq!(turbo.circuit, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_clear_cache_reports_entries() {
        let gateway = ScriptedGateway::new().reply(
            Model::Gpt4oMini,
            r#"{"complexity": "simple", "intent": "factual", "domain": "general", "requires_search": false, "recommended_models": ["gpt-4o-mini"], "reasoning": "lookup", "confidence": 0.9}"#,
        );
        let svc = service(gateway, EnsembleConfig::default());
        let question = Question::new("What is the capital of France?").unwrap();
        svc.classifier.execute(&question, &CancellationToken::new()).await;
        assert_eq!(svc.stats().classification_cache.entries, 1);
        assert_eq!(svc.clear_cache(), 1);
        assert_eq!(svc.stats().classification_cache.entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitoring_is_shared_and_limits_follow_config() {
        let config = EnsembleConfig::default().with_rate_limit(
            RateLimitParams::default().with_budget(1, Duration::from_secs(60)),
        );
        let svc = service(ScriptedGateway::new().reply(Model::Gpt4o, "fine"), config);

        let input = RunEnsembleInput::new(Question::new("What is Rust?").unwrap(), vec![Model::Gpt4o]);
        svc.ensemble().execute(input, &CancellationToken::new()).await.unwrap();
        assert_eq!(svc.latency().report().operations["ensemble"].count, 1);
        svc.latency().reset();
        assert!(svc.latency().report().operations.is_empty());

        assert_eq!(svc.rate_limiter().check("10.0.0.1"), RateDecision::Allowed { remaining: 0 });
        assert!(matches!(svc.rate_limiter().check("10.0.0.1"), RateDecision::Limited { .. }));
    }
}
