//! Route and Answer use case
//!
//! classify -> route -> (optional web search) -> ensemble, with a cost
//! breakdown against the "always call everything" baseline.

use super::classify_query::ClassifyQueryUseCase;
use super::run_ensemble::{RunEnsembleError, RunEnsembleInput, RunEnsembleUseCase};
use crate::ports::model_gateway::ModelGateway;
use crate::ports::query_logger::{QueryEvent, QueryLogger};
use crate::ports::web_search::{SearchResult, WebSearch};
use crate::stats::LatencyMetrics;
use crate::stats::latency::ops;
use ensemble_domain::{
    Classification, CostBreakdown, EnsembleResult, Model, Question, RouteOverrides,
    RoutingDecision, RoutingPolicy, duration_ms,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Input for the RouteAndAnswer use case
#[derive(Debug, Clone)]
pub struct RouteAndAnswerInput {
    pub question: Question,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Replaces the router's model choice
    pub models: Option<Vec<Model>>,
    pub force_synthesis: Option<bool>,
    pub enable_search: bool,
}

impl RouteAndAnswerInput {
    pub fn new(question: Question) -> Self {
        Self {
            question,
            max_tokens: 2000,
            temperature: 0.7,
            models: None,
            force_synthesis: None,
            enable_search: false,
        }
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_models(mut self, models: Vec<Model>) -> Self {
        self.models = Some(models);
        self
    }

    pub fn with_force_synthesis(mut self, force: bool) -> Self {
        self.force_synthesis = Some(force);
        self
    }

    pub fn with_search(mut self, enable: bool) -> Self {
        self.enable_search = enable;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionMetrics {
    pub total_time_ms: u64,
    pub models_used: usize,
    pub synthesis_used: bool,
    pub search_used: bool,
    pub classification_cached: bool,
}

/// Everything the route-and-answer endpoint reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteAndAnswerOutput {
    pub classification: Classification,
    pub routing: RoutingDecision,
    pub result: EnsembleResult,
    pub cost_breakdown: CostBreakdown,
    pub metrics: ExecutionMetrics,
    /// Synthesis if it succeeded, else the best-priority successful answer
    pub final_answer: Option<String>,
    pub final_answer_model: Option<Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchResult>,
}

/// Use case for answering with the cheapest adequate set of models
pub struct RouteAndAnswerUseCase<G: ModelGateway + 'static> {
    classifier: Arc<ClassifyQueryUseCase<G>>,
    policy: RoutingPolicy,
    ensemble: Arc<RunEnsembleUseCase<G>>,
    web_search: Option<Arc<dyn WebSearch>>,
    logger: Arc<dyn QueryLogger>,
    latency: Arc<LatencyMetrics>,
}

impl<G: ModelGateway + 'static> RouteAndAnswerUseCase<G> {
    pub fn new(
        classifier: Arc<ClassifyQueryUseCase<G>>,
        policy: RoutingPolicy,
        ensemble: Arc<RunEnsembleUseCase<G>>,
        web_search: Option<Arc<dyn WebSearch>>,
        logger: Arc<dyn QueryLogger>,
    ) -> Self {
        Self {
            classifier,
            policy,
            ensemble,
            web_search,
            logger,
            latency: Arc::new(LatencyMetrics::new()),
        }
    }

    pub fn with_latency(mut self, latency: Arc<LatencyMetrics>) -> Self {
        self.latency = latency;
        self
    }

    pub async fn execute(
        &self,
        input: RouteAndAnswerInput,
        cancel: &CancellationToken,
    ) -> Result<RouteAndAnswerOutput, RunEnsembleError> {
        let start = Instant::now();

        let classified = self.classifier.execute(&input.question, cancel).await;
        let classification = classified.classification;
        let overrides = RouteOverrides {
            models: input.models.clone(),
            force_synthesis: input.force_synthesis,
        };
        let routing = self.policy.route_with(&classification, &overrides);
        info!("Routing: {}", routing.rationale);
        self.logger.log(QueryEvent::new(
            "route_decided",
            json!({
                "question": input.question.content(),
                "complexity": classification.complexity,
                "fallback_used": classification.fallback_used,
                "cached": classified.cached,
                "models": routing.models_to_use.iter().map(Model::as_str).collect::<Vec<_>>(),
                "use_synthesis": routing.use_synthesis,
                "estimated_cost": routing.estimated_cost.total_cost,
                "recommend_search": routing.recommend_search,
            }),
        ));

        // Search is paid; the router's recommendation is reported, never acted on
        let search = if input.enable_search {
            self.search(input.question.content()).await
        } else {
            if routing.recommend_search {
                info!("Router recommends web search but the caller did not enable it");
            }
            None
        };

        let mut ensemble_input = RunEnsembleInput::new(input.question.clone(), routing.models_to_use.clone())
            .with_limits(input.max_tokens, input.temperature)
            .with_routing(classification.complexity, classification.fallback_used);
        if let Some(model) = &routing.synthesis_model {
            ensemble_input = ensemble_input.with_synthesis(model.clone());
        }
        if let Some(found) = &search {
            ensemble_input = ensemble_input.with_search_context(found.as_context());
        }

        let result = match self.ensemble.execute(ensemble_input, cancel).await {
            Ok(result) => result,
            Err(e) => {
                self.latency
                    .record(ops::ROUTE_AND_ANSWER, duration_ms(start.elapsed()), false);
                return Err(e);
            }
        };

        let synthesis_cost = result.synthesis_cost();
        let cost_breakdown = CostBreakdown::new(
            result.total_cost - synthesis_cost,
            synthesis_cost,
            routing.baseline_cost,
        )
        .with_classification(classified.cost)
        .with_search(search.as_ref().map_or(0.0, |s| s.cost));

        let final_call = result.final_answer();
        let final_answer = final_call.map(|r| r.text.clone());
        let final_answer_model = final_call.map(|r| r.model.clone());

        let metrics = ExecutionMetrics {
            total_time_ms: duration_ms(start.elapsed()),
            models_used: routing.model_count(),
            synthesis_used: result.synthesis.is_some(),
            search_used: search.is_some(),
            classification_cached: classified.cached,
        };
        self.latency.record(ops::ROUTE_AND_ANSWER, metrics.total_time_ms, true);

        Ok(RouteAndAnswerOutput {
            classification,
            routing,
            result,
            cost_breakdown,
            metrics,
            final_answer,
            final_answer_model,
            search,
        })
    }

    async fn search(&self, query: &str) -> Option<SearchResult> {
        let search = self.web_search.as_ref()?;
        match search.search(query).await {
            Ok(found) => {
                info!("Web search returned {} citations", found.citations.len());
                Some(found)
            }
            Err(e) => {
                warn!("Web search failed, answering without it: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassifierParams, GatewayParams};
    use crate::ports::model_gateway::GatewayError;
    use crate::ports::query_logger::NoQueryLogger;
    use crate::ports::web_search::SearchError;
    use crate::resilience::GuardedGateway;
    use crate::stats::{RoutingStats, UsageStats};
    use crate::testing::ScriptedGateway;
    use async_trait::async_trait;
    use ensemble_domain::Complexity;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CLASSIFY_NEEDLE: &str = "Classify this question";

    fn classification_json(complexity: &str) -> String {
        format!(
            r#"{{"complexity": "{complexity}", "intent": "factual", "domain": "general", "requires_search": false, "recommended_models": [], "reasoning": "r", "confidence": 0.8}}"#
        )
    }

    struct FakeSearch {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl WebSearch for FakeSearch {
        async fn search(&self, _query: &str) -> Result<SearchResult, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SearchError::Request("offline".into()));
            }
            Ok(SearchResult {
                answer: "search says hi".into(),
                citations: vec!["https://example.com".into()],
                cost: 0.005,
            })
        }
    }

    fn use_case(
        gateway: ScriptedGateway,
        search: Option<Arc<FakeSearch>>,
    ) -> (RouteAndAnswerUseCase<ScriptedGateway>, Arc<ScriptedGateway>) {
        let inner = Arc::new(gateway);
        let usage = Arc::new(UsageStats::new());
        let guarded = Arc::new(GuardedGateway::new(
            inner.clone(),
            &GatewayParams::default(),
            usage.clone(),
        ));
        let classifier = Arc::new(ClassifyQueryUseCase::new(
            guarded.clone(),
            Model::Gpt4oMini,
            ClassifierParams::default(),
            Model::default_ensemble(),
        ));
        let ensemble = Arc::new(RunEnsembleUseCase::new(
            guarded,
            usage,
            Arc::new(RoutingStats::new()),
            Arc::new(NoQueryLogger),
            0.05,
        ));
        let search = search.map(|s| s as Arc<dyn WebSearch>);
        (
            RouteAndAnswerUseCase::new(
                classifier,
                RoutingPolicy::default(),
                ensemble,
                search,
                Arc::new(NoQueryLogger),
            ),
            inner,
        )
    }

    fn all_models_reply(gateway: ScriptedGateway) -> ScriptedGateway {
        gateway
            .reply_to("Answers to merge", "merged answer")
            .reply(Model::Gpt4Turbo, "turbo answer")
            .reply(Model::Gpt4o, "4o answer")
            .reply(Model::Gpt4oMini, "mini answer")
    }

    fn question(text: &str) -> Question {
        Question::new(text).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_simple_question_uses_one_model() {
        let gateway = all_models_reply(
            ScriptedGateway::new().reply_to(CLASSIFY_NEEDLE, &classification_json("simple")),
        );
        let (uc, _) = use_case(gateway, None);
        let out = uc
            .execute(RouteAndAnswerInput::new(question("What is 2+2?")), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(out.classification.complexity, Complexity::Simple);
        assert_eq!(out.routing.models_to_use, vec![Model::Gpt4oMini]);
        assert!(out.result.synthesis.is_none());
        assert_eq!(out.final_answer.as_deref(), Some("mini answer"));
        assert!(out.cost_breakdown.savings > 0.0);
        assert!(out.cost_breakdown.classification_cost > 0.0);
        assert!(!out.metrics.classification_cached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classifier_failure_runs_full_ensemble() {
        let gateway = all_models_reply(ScriptedGateway::new().fail_to(
            CLASSIFY_NEEDLE,
            GatewayError::Timeout(std::time::Duration::from_secs(10)),
        ));
        let (uc, _) = use_case(gateway, None);
        let out = uc
            .execute(RouteAndAnswerInput::new(question("Explain monads")), &CancellationToken::new())
            .await
            .unwrap();

        assert!(out.classification.fallback_used);
        assert_eq!(out.routing.models_to_use, Model::default_ensemble());
        assert_eq!(out.final_answer.as_deref(), Some("merged answer"));
        assert_eq!(out.final_answer_model, Some(Model::Gpt4o));
        assert!(out.metrics.synthesis_used);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrides_win() {
        let gateway = all_models_reply(
            ScriptedGateway::new().reply_to(CLASSIFY_NEEDLE, &classification_json("complex")),
        );
        let (uc, _) = use_case(gateway, None);
        let out = uc
            .execute(
                RouteAndAnswerInput::new(question("Explain monads"))
                    .with_models(vec![Model::Gpt4o])
                    .with_force_synthesis(false),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out.routing.models_to_use, vec![Model::Gpt4o]);
        assert!(out.result.synthesis.is_none());
        assert_eq!(out.final_answer.as_deref(), Some("4o answer"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_context_is_added() {
        let gateway = all_models_reply(
            ScriptedGateway::new().reply_to(CLASSIFY_NEEDLE, &classification_json("simple")),
        );
        let search = Arc::new(FakeSearch {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let (uc, gw) = use_case(gateway, Some(search.clone()));
        let out = uc
            .execute(
                RouteAndAnswerInput::new(question("What is 2+2?")).with_search(true),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
        assert!(out.metrics.search_used);
        assert!((out.cost_breakdown.search_cost - 0.005).abs() < 1e-12);
        assert_eq!(gw.calls_containing("search says hi"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_recommendation_needs_opt_in() {
        let gateway = all_models_reply(
            ScriptedGateway::new().reply_to(CLASSIFY_NEEDLE, &classification_json("simple")),
        );
        let search = Arc::new(FakeSearch {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let (uc, gw) = use_case(gateway, Some(search.clone()));
        let out = uc
            .execute(
                RouteAndAnswerInput::new(question("What is the latest Rust release?")),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(out.routing.recommend_search);
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
        assert!(!out.metrics.search_used);
        assert!(out.search.is_none());
        assert_eq!(out.cost_breakdown.search_cost, 0.0);
        assert_eq!(gw.calls_containing("search says hi"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_failure_is_ignored() {
        let gateway = all_models_reply(
            ScriptedGateway::new().reply_to(CLASSIFY_NEEDLE, &classification_json("simple")),
        );
        let search = Arc::new(FakeSearch {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let (uc, _) = use_case(gateway, Some(search));
        let out = uc
            .execute(
                RouteAndAnswerInput::new(question("What is 2+2?")).with_search(true),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!out.metrics.search_used);
        assert!(out.final_answer.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_uses_cached_classification() {
        let gateway = all_models_reply(
            ScriptedGateway::new().reply_to(CLASSIFY_NEEDLE, &classification_json("simple")),
        );
        let (uc, gw) = use_case(gateway, None);
        let cancel = CancellationToken::new();
        uc.execute(RouteAndAnswerInput::new(question("What is 2+2?")), &cancel)
            .await
            .unwrap();
        let out = uc
            .execute(RouteAndAnswerInput::new(question("What is 2+2?")), &cancel)
            .await
            .unwrap();
        assert!(out.metrics.classification_cached);
        assert_eq!(out.cost_breakdown.classification_cost, 0.0);
        assert_eq!(gw.calls_containing(CLASSIFY_NEEDLE), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answers_are_timed() {
        let gateway = ScriptedGateway::new()
            .reply_to(CLASSIFY_NEEDLE, &classification_json("simple"))
            .fail(Model::Gpt4oMini, GatewayError::Transport("reset".into()));
        let (uc, _) = use_case(gateway, None);
        let latency = Arc::new(LatencyMetrics::new());
        let uc = uc.with_latency(latency.clone());

        let result = uc
            .execute(RouteAndAnswerInput::new(question("What is 2+2?")), &CancellationToken::new())
            .await;
        assert!(result.is_err());
        let summary = latency.summary(ops::ROUTE_AND_ANSWER).unwrap();
        assert_eq!((summary.count, summary.error_rate), (1, 1.0));
    }
}
