//! Model Gateway wrapped with resource and failure policies.
//!
//! Every call goes through the same sequence: breaker admission, a slot from
//! the process-wide semaphore, the adapter call under a timeout, then breaker
//! and usage bookkeeping. The semaphore permit is an RAII guard, so it is
//! released on every exit path, cancellation included. There are no retries.

use super::circuit_breaker::{Admission, BreakerConfig, CircuitBreaker, CircuitState};
use crate::config::GatewayParams;
use crate::ports::model_gateway::{Completion, CompletionRequest, GatewayError, ModelGateway};
use crate::stats::UsageStats;
use ensemble_domain::{CallErrorKind, ModelCallResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct GuardedGateway<G: ModelGateway + 'static> {
    inner: Arc<G>,
    limiter: Arc<Semaphore>,
    call_timeout: Duration,
    breaker: CircuitBreaker,
    usage: Arc<UsageStats>,
}

impl<G: ModelGateway + 'static> GuardedGateway<G> {
    pub fn new(inner: Arc<G>, params: &GatewayParams, usage: Arc<UsageStats>) -> Self {
        Self {
            inner,
            limiter: Arc::new(Semaphore::new(params.max_concurrent_calls)),
            call_timeout: params.call_timeout,
            breaker: CircuitBreaker::new(BreakerConfig {
                failure_threshold: params.breaker_failure_threshold,
                window: params.breaker_window,
                cooldown: params.breaker_cooldown,
            }),
            usage,
        }
    }

    pub fn circuit_state(&self, model: &str) -> CircuitState {
        self.breaker.state(model)
    }

    /// Slots currently free under the concurrency ceiling
    pub fn available_slots(&self) -> usize {
        self.limiter.available_permits()
    }

    /// Call a model, returning the raw completion or a classified error
    ///
    /// Usage counters are not touched; use [`call`](Self::call) for that.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<Completion, GatewayError> {
        let model = request.model.as_str();
        if let Admission::Rejected { retry_in } = self.breaker.admit(model) {
            debug!("Circuit open for {}, rejecting call", model);
            return Err(GatewayError::CircuitOpen {
                model: model.to_string(),
                retry_in,
            });
        }

        let outcome = self.guarded(request, cancel).await;
        match &outcome {
            Ok(_) => self.breaker.record_success(model),
            Err(e) if e.counts_against_breaker() => self.breaker.record_failure(model),
            Err(_) => self.breaker.record_abandoned(model),
        }
        outcome
    }

    async fn guarded(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<Completion, GatewayError> {
        let _permit = tokio::select! {
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            permit = self.limiter.acquire() => permit.map_err(|_| GatewayError::Cancelled)?,
        };

        let timeout = request.timeout.unwrap_or(self.call_timeout);
        tokio::select! {
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            result = tokio::time::timeout(timeout, self.inner.complete(request)) => {
                result.unwrap_or(Err(GatewayError::Timeout(timeout)))
            }
        }
    }

    /// Call a model and fold the outcome into a [`ModelCallResult`]
    ///
    /// Never fails: errors become `success = false` entries carrying their
    /// kind. Usage counters are updated for every settled call.
    pub async fn call(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> ModelCallResult {
        let start = Instant::now();
        let result = match self.complete(request, cancel).await {
            Ok(completion) => ModelCallResult::success(
                request.model.clone(),
                completion.text,
                completion.usage,
                start.elapsed(),
            ),
            Err(e) => {
                if e.kind() != CallErrorKind::Cancelled {
                    warn!("Model {} failed: {}", request.model, e);
                }
                ModelCallResult::failure(request.model.clone(), e.kind(), e.to_string(), start.elapsed())
                    .with_retry_after(e.retry_after())
            }
        };
        self.usage.record_call(&result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGateway;
    use ensemble_domain::Model;

    fn guarded(gateway: ScriptedGateway, params: GatewayParams) -> (GuardedGateway<ScriptedGateway>, Arc<ScriptedGateway>) {
        let inner = Arc::new(gateway);
        (
            GuardedGateway::new(inner.clone(), &params, Arc::new(UsageStats::new())),
            inner,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_priced() {
        let (gw, _) = guarded(
            ScriptedGateway::new().reply(Model::Gpt4o, "hello"),
            GatewayParams::default(),
        );
        let request = CompletionRequest::new(Model::Gpt4o, "hi");
        let result = gw.call(&request, &CancellationToken::new()).await;
        assert!(result.success);
        assert_eq!(result.text, "hello");
        assert!(result.cost > 0.0);
        assert_eq!(gw.usage.snapshot().total_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_classified() {
        let (gw, _) = guarded(
            ScriptedGateway::new().reply_after(Model::Gpt4o, "late", Duration::from_secs(60)),
            GatewayParams::default().with_call_timeout(Duration::from_secs(5)),
        );
        let result = gw
            .call(&CompletionRequest::new(Model::Gpt4o, "hi"), &CancellationToken::new())
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(CallErrorKind::Timeout));
        assert_eq!(gw.available_slots(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_overrides_default() {
        let (gw, _) = guarded(
            ScriptedGateway::new().reply_after(Model::Gpt4o, "slow", Duration::from_secs(40)),
            GatewayParams::default(),
        );
        let request = CompletionRequest::new(Model::Gpt4o, "hi").with_timeout(Duration::from_secs(45));
        let result = gw.call(&request, &CancellationToken::new()).await;
        assert!(result.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_ceiling() {
        let (gw, inner) = guarded(
            ScriptedGateway::new().reply_after(Model::Gpt4o, "ok", Duration::from_secs(1)),
            GatewayParams::default().with_max_concurrent_calls(2),
        );
        let gw = Arc::new(gw);
        let mut handles = Vec::new();
        for _ in 0..6 {
            let gw = gw.clone();
            handles.push(tokio::spawn(async move {
                gw.call(&CompletionRequest::new(Model::Gpt4o, "hi"), &CancellationToken::new())
                    .await
            }));
        }
        let start = Instant::now();
        for handle in handles {
            assert!(handle.await.unwrap().success);
        }
        assert_eq!(inner.max_in_flight(), 2);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
        assert_eq!(gw.available_slots(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_releases_slot() {
        let (gw, _) = guarded(
            ScriptedGateway::new().reply_after(Model::Gpt4o, "never", Duration::from_secs(20)),
            GatewayParams::default().with_max_concurrent_calls(1),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let result = gw
            .call(&CompletionRequest::new(Model::Gpt4o, "hi"), &cancel)
            .await;
        assert_eq!(result.error_kind, Some(CallErrorKind::Cancelled));
        assert_eq!(gw.available_slots(), 1);
        assert_eq!(gw.circuit_state("gpt-4o"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_short_circuits_after_five_failures() {
        let (gw, inner) = guarded(
            ScriptedGateway::new().fail(
                Model::Gpt4o,
                GatewayError::Upstream {
                    status: 500,
                    message: "down".into(),
                },
            ),
            GatewayParams::default(),
        );
        let request = CompletionRequest::new(Model::Gpt4o, "hi");
        let cancel = CancellationToken::new();
        for _ in 0..5 {
            let result = gw.call(&request, &cancel).await;
            assert_eq!(result.error_kind, Some(CallErrorKind::Upstream));
        }
        assert_eq!(inner.calls_to(&Model::Gpt4o), 5);

        let rejected = gw.call(&request, &cancel).await;
        assert_eq!(rejected.error_kind, Some(CallErrorKind::CircuitOpen));
        assert_eq!(inner.calls_to(&Model::Gpt4o), 5);

        tokio::time::advance(Duration::from_secs(30)).await;
        let trial = gw.call(&request, &cancel).await;
        assert_eq!(trial.error_kind, Some(CallErrorKind::Upstream));
        assert_eq!(inner.calls_to(&Model::Gpt4o), 6);
        assert_eq!(gw.circuit_state("gpt-4o"), CircuitState::Open);
    }
}
