//! Per-client request budget for the model-calling routes.
//!
//! Clients are keyed by peer address, which is only present when the server
//! is started with `into_make_service_with_connect_info`.

use super::error::ApiError;
use super::handlers::SharedService;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use ensemble_application::{ModelGateway, RateDecision};
use std::net::SocketAddr;
use tracing::debug;

pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

const UNKNOWN_CLIENT: &str = "unknown";

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub async fn limit_requests<G: ModelGateway + 'static>(
    State(service): State<SharedService<G>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    match service.rate_limiter().check(&client) {
        RateDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert(REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        RateDecision::Limited { retry_after_secs } => {
            debug!("Rejected {} on {}", client, request.uri().path());
            ApiError::rate_limited(retry_after_secs).into_response()
        }
    }
}
