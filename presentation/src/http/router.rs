//! Router assembly

use super::handlers::{self, SharedService};
use super::rate_limit::limit_requests;
use axum::Router;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};
use ensemble_application::ModelGateway;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Build the `/api` router around a shared service
///
/// Model-calling routes sit behind the per-client rate limit. An empty
/// origin list (or one containing `*`) allows any origin.
pub fn create_router<G: ModelGateway + 'static>(
    service: SharedService<G>,
    cors_origins: &[String],
) -> Router {
    let api = Router::new()
        .route("/ensemble", post(handlers::ensemble::<G>))
        .route("/route-and-answer", post(handlers::route_and_answer::<G>))
        .route("/synthesize", post(handlers::synthesize::<G>))
        .route("/time-travel-stream", post(handlers::time_travel_stream::<G>))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&service),
            limit_requests::<G>,
        ))
        .route("/stats", get(handlers::stats::<G>))
        .route("/router/stats", get(handlers::router_stats::<G>))
        .route("/router/clear-cache", post(handlers::clear_cache::<G>))
        .route("/models", get(handlers::models::<G>))
        .route("/health", get(handlers::health::<G>))
        .route("/monitoring/metrics", get(handlers::metrics::<G>))
        .route("/monitoring/stats", get(handlers::latency_stats::<G>))
        .route("/monitoring/alerts", get(handlers::alerts::<G>))
        .route("/monitoring/latency-breakdown", get(handlers::latency_breakdown::<G>))
        .route("/monitoring/reset-stats", post(handlers::reset_stats::<G>))
        .with_state(service);

    Router::new()
        .nest("/api", api)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o.trim() == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
