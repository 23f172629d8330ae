//! Run Ensemble use case
//!
//! Fans the question out to every selected model concurrently, waits for all
//! calls to settle, then optionally merges the successful answers with one
//! synthesis call. [`RunEnsembleUseCase::synthesize`] runs that merge step
//! alone over answers collected elsewhere.

use super::shared::fan_out;
use crate::ports::model_gateway::{CompletionRequest, ModelGateway};
use crate::ports::query_logger::{QueryEvent, QueryLogger};
use crate::resilience::GuardedGateway;
use crate::stats::latency::ops;
use crate::stats::{LatencyMetrics, QueryRecord, RoutingStats, UsageStats};
use ensemble_domain::{
    CallErrorKind, Complexity, EnsembleResult, Model, ModelCallResult, PromptTemplate, Question,
    duration_ms,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors that surface as request-level failures
#[derive(Error, Debug, Clone)]
pub enum RunEnsembleError {
    #[error("No models selected")]
    NoModels,

    #[error("No successful answers to synthesize")]
    NothingToSynthesize,

    #[error("All {} model calls failed", responses.len())]
    TotalFailure { responses: Vec<ModelCallResult> },
}

impl RunEnsembleError {
    /// The single failure kind shared by every response, if there is one
    pub fn uniform_kind(&self) -> Option<CallErrorKind> {
        match self {
            RunEnsembleError::NoModels | RunEnsembleError::NothingToSynthesize => None,
            RunEnsembleError::TotalFailure { responses } => {
                let first = responses.first()?.error_kind?;
                responses
                    .iter()
                    .all(|r| r.error_kind == Some(first))
                    .then_some(first)
            }
        }
    }

    /// Longest back-off hint among the failed responses, in seconds
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            RunEnsembleError::NoModels | RunEnsembleError::NothingToSynthesize => None,
            RunEnsembleError::TotalFailure { responses } => {
                responses.iter().filter_map(|r| r.retry_after_secs).max()
            }
        }
    }
}

/// Input for the RunEnsemble use case
#[derive(Debug, Clone)]
pub struct RunEnsembleInput {
    pub question: Question,
    /// Invocation order; duplicates are the caller's responsibility
    pub models: Vec<Model>,
    /// Present iff synthesis is wanted
    pub synthesis_model: Option<Model>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Web search results to ground the answers in
    pub search_context: Option<String>,
    /// Recorded in the routing statistics
    pub complexity: Option<Complexity>,
    pub fallback_used: bool,
}

impl RunEnsembleInput {
    pub fn new(question: Question, models: Vec<Model>) -> Self {
        Self {
            question,
            models,
            synthesis_model: None,
            max_tokens: 2000,
            temperature: 0.7,
            search_context: None,
            complexity: None,
            fallback_used: false,
        }
    }

    pub fn with_synthesis(mut self, model: Model) -> Self {
        self.synthesis_model = Some(model);
        self
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_search_context(mut self, context: impl Into<String>) -> Self {
        self.search_context = Some(context.into());
        self
    }

    pub fn with_routing(mut self, complexity: Complexity, fallback_used: bool) -> Self {
        self.complexity = Some(complexity);
        self.fallback_used = fallback_used;
        self
    }
}

/// Answers gathered outside this service, to be merged by one model
#[derive(Debug, Clone)]
pub struct SynthesizeInput {
    pub question: Question,
    /// (model label, answer text); blank answers are ignored
    pub answers: Vec<(String, String)>,
    pub model: Model,
    pub max_tokens: u32,
}

impl SynthesizeInput {
    pub const DEFAULT_MAX_TOKENS: u32 = 1500;

    pub fn new(question: Question, answers: Vec<(String, String)>, model: Model) -> Self {
        Self {
            question,
            answers,
            model,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

const SYNTHESIZE_TEMPERATURE: f32 = 0.5;

/// Use case for running one ensemble fan-out
pub struct RunEnsembleUseCase<G: ModelGateway + 'static> {
    gateway: Arc<GuardedGateway<G>>,
    usage: Arc<UsageStats>,
    routing_stats: Arc<RoutingStats>,
    logger: Arc<dyn QueryLogger>,
    latency: Arc<LatencyMetrics>,
    /// Cost of calling every default model plus synthesis, for savings
    baseline_cost: f64,
}

impl<G: ModelGateway + 'static> RunEnsembleUseCase<G> {
    pub fn new(
        gateway: Arc<GuardedGateway<G>>,
        usage: Arc<UsageStats>,
        routing_stats: Arc<RoutingStats>,
        logger: Arc<dyn QueryLogger>,
        baseline_cost: f64,
    ) -> Self {
        Self {
            gateway,
            usage,
            routing_stats,
            logger,
            latency: Arc::new(LatencyMetrics::new()),
            baseline_cost,
        }
    }

    pub fn with_latency(mut self, latency: Arc<LatencyMetrics>) -> Self {
        self.latency = latency;
        self
    }

    pub async fn execute(
        &self,
        input: RunEnsembleInput,
        cancel: &CancellationToken,
    ) -> Result<EnsembleResult, RunEnsembleError> {
        if input.models.is_empty() {
            return Err(RunEnsembleError::NoModels);
        }
        info!("Starting ensemble with {} models", input.models.len());
        self.usage.record_query();
        let start = Instant::now();

        let prompt = PromptTemplate::ensemble_query(
            input.question.content(),
            input.search_context.as_deref(),
        );
        let requests: Vec<CompletionRequest> = input
            .models
            .iter()
            .map(|model| {
                CompletionRequest::new(model.clone(), prompt.clone())
                    .with_system(PromptTemplate::ensemble_system())
                    .with_max_tokens(input.max_tokens)
                    .with_temperature(input.temperature)
            })
            .collect();

        let responses = fan_out(&self.gateway, &requests, cancel, |_, result| {
            if result.success {
                info!("Model {} responded successfully", result.model);
            }
        })
        .await;

        for failed in responses.iter().filter(|r| !r.success) {
            self.logger.log(QueryEvent::new(
                "model_call_failed",
                json!({
                    "model": failed.model.as_str(),
                    "error_kind": failed.error_kind,
                    "error": failed.error,
                    "latency_ms": failed.latency_ms,
                }),
            ));
        }

        let successful: Vec<(String, String)> = responses
            .iter()
            .filter(|r| r.success)
            .map(|r| (r.model.to_string(), r.text.clone()))
            .collect();
        if successful.is_empty() {
            warn!("All {} models failed", responses.len());
            self.latency
                .record(ops::ENSEMBLE, duration_ms(start.elapsed()), false);
            return Err(RunEnsembleError::TotalFailure { responses });
        }

        let synthesis = match &input.synthesis_model {
            Some(model) => {
                info!("Synthesizing {} responses with {}", successful.len(), model);
                let request = CompletionRequest::new(
                    model.clone(),
                    PromptTemplate::synthesis_prompt(input.question.content(), &successful),
                )
                .with_system(PromptTemplate::synthesis_system())
                .with_max_tokens(input.max_tokens)
                .with_temperature(input.temperature);
                Some(self.gateway.call(&request, cancel).await)
            }
            None => None,
        };

        let result = EnsembleResult::new(
            input.question.content(),
            responses,
            synthesis,
            start.elapsed(),
        );
        self.record(&input, &result);
        self.latency.record(ops::ENSEMBLE, result.total_time_ms, true);
        Ok(result)
    }

    /// Merge pre-collected answers with one synthesis call
    pub async fn synthesize(
        &self,
        input: SynthesizeInput,
        cancel: &CancellationToken,
    ) -> Result<ModelCallResult, RunEnsembleError> {
        let answers: Vec<(String, String)> = input
            .answers
            .into_iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .collect();
        if answers.is_empty() {
            return Err(RunEnsembleError::NothingToSynthesize);
        }
        info!("Synthesizing {} supplied answers with {}", answers.len(), input.model);
        self.usage.record_query();

        let request = CompletionRequest::new(
            input.model,
            PromptTemplate::synthesis_prompt(input.question.content(), &answers),
        )
        .with_system(PromptTemplate::synthesis_system())
        .with_max_tokens(input.max_tokens)
        .with_temperature(SYNTHESIZE_TEMPERATURE);
        let call = self.gateway.call(&request, cancel).await;
        self.latency.record(ops::SYNTHESIS, call.latency_ms, call.success);

        self.logger.log(QueryEvent::new(
            "synthesis_completed",
            json!({
                "question": input.question.content(),
                "answers": answers.len(),
                "model": call.model.as_str(),
                "success": call.success,
                "cost": call.cost,
                "latency_ms": call.latency_ms,
            }),
        ));
        if call.success {
            Ok(call)
        } else {
            warn!(
                "Synthesis with {} failed: {}",
                call.model,
                call.error.as_deref().unwrap_or_default()
            );
            Err(RunEnsembleError::TotalFailure {
                responses: vec![call],
            })
        }
    }

    fn record(&self, input: &RunEnsembleInput, result: &EnsembleResult) {
        let record = QueryRecord::new(
            input.question.content(),
            input.complexity,
            input.models.iter().map(|m| m.to_string()).collect(),
            result.synthesis.is_some(),
            result.total_cost,
            self.baseline_cost,
        )
        .with_fallback(input.fallback_used);
        self.routing_stats.record(record);

        self.logger.log(QueryEvent::new(
            "ensemble_completed",
            json!({
                "question": input.question.content(),
                "models": input.models.iter().map(Model::as_str).collect::<Vec<_>>(),
                "succeeded": result.success_count(),
                "failed": result.failure_count(),
                "synthesis": result.synthesis.as_ref().map(|s| s.success),
                "total_cost": result.total_cost,
                "total_tokens": result.total_tokens(),
                "total_time_ms": result.total_time_ms,
            }),
        ));
        info!(
            "Ensemble finished in {}ms, cost ${:.6}",
            result.total_time_ms, result.total_cost
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayParams;
    use crate::ports::model_gateway::GatewayError;
    use crate::ports::query_logger::NoQueryLogger;
    use crate::testing::ScriptedGateway;
    use std::time::Duration;

    fn use_case(gateway: ScriptedGateway) -> (RunEnsembleUseCase<ScriptedGateway>, Arc<ScriptedGateway>, Arc<RoutingStats>) {
        let inner = Arc::new(gateway);
        let usage = Arc::new(UsageStats::new());
        let routing = Arc::new(RoutingStats::new());
        let guarded = Arc::new(GuardedGateway::new(
            inner.clone(),
            &GatewayParams::default(),
            usage.clone(),
        ));
        (
            RunEnsembleUseCase::new(guarded, usage, routing.clone(), Arc::new(NoQueryLogger), 0.05),
            inner,
            routing,
        )
    }

    fn input(models: Vec<Model>) -> RunEnsembleInput {
        RunEnsembleInput::new(Question::new("Compare Rust and Go").unwrap(), models)
    }

    fn transport() -> GatewayError {
        GatewayError::Transport("connection reset".into())
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_bounded_by_slowest_call() {
        let gateway = ScriptedGateway::new()
            .reply_to_after("Answers to merge", "merged", Duration::from_secs(2))
            .reply_after(Model::Gpt4Turbo, "turbo", Duration::from_secs(5))
            .reply_after(Model::Gpt4o, "4o", Duration::from_secs(3))
            .reply_after(Model::Gpt4oMini, "mini", Duration::from_secs(1));
        let (uc, _, _) = use_case(gateway);

        let start = Instant::now();
        let result = uc
            .execute(
                input(Model::default_ensemble()).with_synthesis(Model::Gpt4o),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let elapsed = start.elapsed();

        // 5s slowest + 2s synthesis, not 1 + 3 + 5 + 2
        assert!(elapsed >= Duration::from_secs(7) && elapsed < Duration::from_secs(8));
        assert_eq!(result.synthesis.as_ref().unwrap().text, "merged");
    }

    #[tokio::test(start_paused = true)]
    async fn test_responses_keep_invocation_order() {
        let gateway = ScriptedGateway::new()
            .reply_after(Model::Gpt4Turbo, "turbo", Duration::from_secs(3))
            .reply_after(Model::Gpt4o, "4o", Duration::from_secs(2))
            .reply_after(Model::Gpt4oMini, "mini", Duration::from_secs(1));
        let (uc, _, _) = use_case(gateway);
        let result = uc
            .execute(input(Model::default_ensemble()), &CancellationToken::new())
            .await
            .unwrap();
        let order: Vec<&str> = result.responses.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(order, vec!["turbo", "4o", "mini"]);
        assert!(result.synthesis.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_keeps_every_entry() {
        let gateway = ScriptedGateway::new()
            .reply_to("Answers to merge", "merged")
            .fail(Model::Gpt4Turbo, transport())
            .reply(Model::Gpt4o, "4o answer")
            .reply(Model::Gpt4oMini, "mini answer");
        let (uc, gw, _) = use_case(gateway);
        let result = uc
            .execute(
                input(Model::default_ensemble()).with_synthesis(Model::Gpt4o),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.responses.len(), 3);
        assert!(!result.responses[0].success);
        assert_eq!(result.responses[0].error_kind, Some(CallErrorKind::Transport));
        assert!(result.is_partial_failure());

        let synthesis_request = gw
            .requests()
            .into_iter()
            .find(|r| r.prompt.contains("Answers to merge"))
            .unwrap();
        assert!(synthesis_request.prompt.contains("4o answer"));
        assert!(synthesis_request.prompt.contains("mini answer"));
        assert!(!synthesis_request.prompt.contains("gpt-4-turbo"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_skips_synthesis() {
        let gateway = ScriptedGateway::new()
            .reply_to("Answers to merge", "merged")
            .fail(Model::Gpt4o, transport())
            .fail(Model::Gpt4oMini, transport());
        let (uc, gw, routing) = use_case(gateway);
        let err = uc
            .execute(
                input(vec![Model::Gpt4o, Model::Gpt4oMini]).with_synthesis(Model::Gpt4o),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match &err {
            RunEnsembleError::TotalFailure { responses } => assert_eq!(responses.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.uniform_kind(), Some(CallErrorKind::Transport));
        assert_eq!(gw.calls_containing("Answers to merge"), 0);
        assert_eq!(routing.snapshot().total_queries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_failure_keeps_longest_hint() {
        let limited = |secs| GatewayError::RateLimited {
            retry_after: Some(Duration::from_secs(secs)),
        };
        let gateway = ScriptedGateway::new()
            .fail(Model::Gpt4o, limited(3))
            .fail(Model::Gpt4oMini, limited(12));
        let (uc, _, _) = use_case(gateway);
        let err = uc
            .execute(input(vec![Model::Gpt4o, Model::Gpt4oMini]), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.uniform_kind(), Some(CallErrorKind::RateLimited));
        assert_eq!(err.retry_after_secs(), Some(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_cost_sums_successes_and_synthesis() {
        let gateway = ScriptedGateway::new()
            .reply_to("Answers to merge", "merged")
            .fail(Model::Gpt4Turbo, transport())
            .reply(Model::Gpt4o, "a")
            .reply(Model::Gpt4oMini, "b");
        let (uc, _, routing) = use_case(gateway);
        let result = uc
            .execute(
                input(Model::default_ensemble()).with_synthesis(Model::Gpt4o),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let expected: f64 = result.responses.iter().filter(|r| r.success).map(|r| r.cost).sum::<f64>()
            + result.synthesis.as_ref().unwrap().cost;
        assert!((result.total_cost - expected).abs() < 1e-12);
        assert_eq!(result.responses[0].cost, 0.0);

        let snap = routing.snapshot();
        assert_eq!(snap.total_queries, 1);
        assert!((snap.total_actual_cost - result.total_cost).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_no_models() {
        let (uc, _, _) = use_case(ScriptedGateway::new());
        assert!(matches!(
            uc.execute(input(vec![]), &CancellationToken::new()).await,
            Err(RunEnsembleError::NoModels)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_context_reaches_prompt() {
        let (uc, gw, _) = use_case(ScriptedGateway::new().reply(Model::Gpt4o, "ok"));
        uc.execute(
            input(vec![Model::Gpt4o]).with_search_context("fresh facts"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(gw.requests()[0].prompt.contains("fresh facts"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesize_supplied_answers() {
        let gateway = ScriptedGateway::new().reply_after(Model::Gpt4o, "merged view", Duration::from_secs(2));
        let (uc, gw, routing) = use_case(gateway);
        let latency = Arc::new(LatencyMetrics::new());
        let uc = uc.with_latency(latency.clone());

        let answers = vec![
            ("gpt-4o-mini".to_string(), "Rust is fast".to_string()),
            ("claude".to_string(), "   ".to_string()),
            ("local".to_string(), "Go is simple".to_string()),
        ];
        let input = SynthesizeInput::new(Question::new("Compare Rust and Go").unwrap(), answers, Model::Gpt4o)
            .with_max_tokens(400);
        let merged = uc.synthesize(input, &CancellationToken::new()).await.unwrap();

        assert_eq!(merged.text, "merged view");
        assert_eq!(merged.latency_ms, 2000);
        let request = &gw.requests()[0];
        assert_eq!(request.max_tokens, 400);
        assert!(request.prompt.contains("Rust is fast") && request.prompt.contains("Go is simple"));
        assert!(!request.prompt.contains("claude"));
        // Not an ensemble run, so the router history is untouched
        assert_eq!(routing.snapshot().total_queries, 0);
        assert_eq!(latency.summary(ops::SYNTHESIS).unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_synthesize_errors() {
        let (uc, _, _) = use_case(ScriptedGateway::new().fail(Model::Gpt4o, transport()));
        let question = Question::new("Compare Rust and Go").unwrap();

        let blank = SynthesizeInput::new(question.clone(), vec![("a".into(), "".into())], Model::Gpt4o);
        assert!(matches!(
            uc.synthesize(blank, &CancellationToken::new()).await,
            Err(RunEnsembleError::NothingToSynthesize)
        ));

        let input = SynthesizeInput::new(question, vec![("a".into(), "answer".into())], Model::Gpt4o);
        match uc.synthesize(input, &CancellationToken::new()).await {
            Err(err @ RunEnsembleError::TotalFailure { .. }) => {
                assert_eq!(err.uniform_kind(), Some(CallErrorKind::Transport));
            }
            other => panic!("expected total failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_are_timed() {
        let gateway = ScriptedGateway::new()
            .reply_after(Model::Gpt4o, "ok", Duration::from_secs(3))
            .fail(Model::Gpt4oMini, transport());
        let (uc, _, _) = use_case(gateway);
        let latency = Arc::new(LatencyMetrics::new());
        let uc = uc.with_latency(latency.clone());

        uc.execute(input(vec![Model::Gpt4o]), &CancellationToken::new()).await.unwrap();
        let _ = uc.execute(input(vec![Model::Gpt4oMini]), &CancellationToken::new()).await;

        let summary = latency.summary(ops::ENSEMBLE).unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.max, 3000.0);
        assert_eq!(summary.error_rate, 0.5);
    }
}
