//! Route handlers
//!
//! Each handler owns a fresh cancellation token guarded by a `DropGuard`, so
//! a client that disconnects mid-request cancels only its own model calls.

use super::dto::{
    ClearCacheResponse, EnsembleRequest, Limits, ResetStatsResponse, RouteAndAnswerRequest,
    SynthesizeRequest, SynthesizeResponse, TimeTravelRequest, parse_model, parse_models,
    parse_question, synthesis_max_tokens,
};
use super::error::ApiError;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::Utc;
use ensemble_application::{
    AlertReport, EnsembleService, HealthReport, LatencyBreakdown, LatencyReport, ModelGateway,
    ModelInfo, RouteAndAnswerInput, RouteAndAnswerOutput, RoutingStatsSnapshot, RunEnsembleInput,
    ServiceStats, SynthesizeInput, TimeTravelInput,
};
use ensemble_domain::EnsembleResult;
use futures::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub type SharedService<G> = Arc<EnsembleService<G>>;

/// Fixed model list, always merged by the configured synthesis model
pub async fn ensemble<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
    payload: Result<Json<EnsembleRequest>, JsonRejection>,
) -> Result<Json<EnsembleResult>, ApiError> {
    let Json(req) = payload?;
    let question = parse_question(&req.question)?;
    let limits = Limits::resolve(req.max_tokens, req.temperature)?;
    let slots = &service.config().models;
    let models = parse_models(req.models.as_deref())?.unwrap_or_else(|| slots.ensemble.clone());
    info!("Ensemble request for {} models", models.len());

    let input = RunEnsembleInput::new(question, models)
        .with_synthesis(slots.synthesis.clone())
        .with_limits(limits.max_tokens, limits.temperature);

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let result = service.ensemble().execute(input, &cancel).await?;
    Ok(Json(result))
}

pub async fn route_and_answer<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
    payload: Result<Json<RouteAndAnswerRequest>, JsonRejection>,
) -> Result<Json<RouteAndAnswerOutput>, ApiError> {
    let Json(req) = payload?;
    let question = parse_question(&req.question)?;
    let limits = Limits::resolve(req.max_tokens, req.temperature)?;

    let mut input = RouteAndAnswerInput::new(question)
        .with_limits(limits.max_tokens, limits.temperature)
        .with_search(req.enable_search);
    if let Some(models) = parse_models(req.override_models.as_deref())? {
        input = input.with_models(models);
    }
    if let Some(force) = req.force_synthesis {
        input = input.with_force_synthesis(force);
    }

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let output = service.route_and_answer().execute(input, &cancel).await?;
    Ok(Json(output))
}

/// Merge answers the client already collected
pub async fn synthesize<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
    payload: Result<Json<SynthesizeRequest>, JsonRejection>,
) -> Result<Json<SynthesizeResponse>, ApiError> {
    let Json(req) = payload?;
    let question = parse_question(&req.question)?;
    let max_tokens = synthesis_max_tokens(req.max_tokens)?;
    let model = match req.synthesis_model.as_deref() {
        Some(id) => parse_model(id)?,
        None => service.config().models.synthesis.clone(),
    };
    let input = SynthesizeInput::new(question, req.supplied(), model).with_max_tokens(max_tokens);

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let synthesis = service.ensemble().synthesize(input, &cancel).await?;
    Ok(Json(SynthesizeResponse { synthesis }))
}

/// Server-sent events, one JSON `data:` line per stream event
pub async fn time_travel_stream<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
    payload: Result<Json<TimeTravelRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(req) = payload?;
    let question = parse_question(&req.question)?;
    let events = service.stream_time_travel(TimeTravelInput::new(question).forced(req.force))?;

    let stream = async_stream::stream! {
        let mut events = events;
        while let Some(frame) = events.next_frame().await {
            if let Some(event) = sse_event(&frame) {
                yield Ok(event);
            }
        }
        debug!("Time-travel stream drained");
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// A frame that fails to serialize is dropped rather than sent as an empty `data:` line
fn sse_event(frame: &impl Serialize) -> Option<Event> {
    match serde_json::to_string(frame) {
        Ok(data) => Some(Event::default().data(data)),
        Err(e) => {
            warn!("Dropping unserializable stream frame: {}", e);
            None
        }
    }
}

pub async fn stats<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
) -> Json<ServiceStats> {
    Json(service.stats())
}

pub async fn router_stats<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
) -> Json<RoutingStatsSnapshot> {
    Json(service.router_stats())
}

pub async fn clear_cache<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
) -> Json<ClearCacheResponse> {
    Json(ClearCacheResponse {
        cleared: service.clear_cache(),
    })
}

pub async fn metrics<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        service.latency().prometheus(),
    )
}

pub async fn latency_stats<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
) -> Json<LatencyReport> {
    Json(service.latency().report())
}

pub async fn alerts<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
) -> Json<AlertReport> {
    Json(service.latency().alerts())
}

pub async fn latency_breakdown<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
) -> Json<LatencyBreakdown> {
    Json(service.latency().breakdown())
}

/// Clears latency samples only; rate-limit windows keep running
pub async fn reset_stats<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
) -> Json<ResetStatsResponse> {
    service.latency().reset();
    info!("Latency statistics reset");
    Json(ResetStatsResponse {
        message: "Statistics reset successfully",
        reset_at: Utc::now(),
    })
}

pub async fn models<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
) -> Json<Vec<ModelInfo>> {
    Json(service.models())
}

pub async fn health<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
) -> Json<HealthReport> {
    Json(service.health())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_unserializable_frame_is_dropped() {
        // JSON object keys must be strings
        let frame: BTreeMap<(u8, u8), u8> = BTreeMap::from([((1, 2), 3)]);
        assert!(sse_event(&frame).is_none());
        assert!(sse_event(&serde_json::json!({"type": "start"})).is_some());
    }
}
