//! Shared utilities for use cases.
//!
//! Contains the structured-concurrency fan-out used by both the ensemble
//! executor and the time-travel snapshot stage.

use crate::ports::model_gateway::{CompletionRequest, ModelGateway};
use crate::resilience::GuardedGateway;
use ensemble_domain::{CallErrorKind, ModelCallResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Issue every request concurrently and wait for all of them to settle.
///
/// Results come back in request order; `on_settled` sees them in completion
/// order. A failed call never cancels its siblings. A task that dies without
/// a result is recorded as an `internal` failure for its model.
pub(crate) async fn fan_out<G, F>(
    gateway: &Arc<GuardedGateway<G>>,
    requests: &[CompletionRequest],
    cancel: &CancellationToken,
    mut on_settled: F,
) -> Vec<ModelCallResult>
where
    G: ModelGateway + 'static,
    F: FnMut(usize, &ModelCallResult),
{
    let mut join_set = JoinSet::new();
    for (index, request) in requests.iter().enumerate() {
        let gateway = Arc::clone(gateway);
        let request = request.clone();
        let cancel = cancel.clone();
        join_set.spawn(async move {
            let result = gateway.call(&request, &cancel).await;
            (index, result)
        });
    }

    let mut settled: Vec<Option<ModelCallResult>> = vec![None; requests.len()];
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, result)) => {
                on_settled(index, &result);
                settled[index] = Some(result);
            }
            Err(e) => {
                warn!("Task join error: {}", e);
            }
        }
    }

    settled
        .into_iter()
        .zip(requests)
        .map(|(result, request)| {
            result.unwrap_or_else(|| {
                ModelCallResult::failure(
                    request.model.clone(),
                    CallErrorKind::Internal,
                    "task ended without a result",
                    Duration::ZERO,
                )
            })
        })
        .collect()
}
