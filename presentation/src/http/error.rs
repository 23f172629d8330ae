//! Request-level failures and their HTTP shape
//!
//! Only malformed input and total fan-out failure reach the client as
//! errors; partial failures are reported inside a 200 body.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use ensemble_application::{RunEnsembleError, ServiceError};
use ensemble_domain::{CallErrorKind, DomainError};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                kind,
                message: message.into(),
                retry_after_secs: None,
            },
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    /// Client over its request budget
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            format!("Too many requests; retry in {}s", retry_after_secs),
        )
        .with_retry_after(Some(retry_after_secs))
    }

    fn with_retry_after(mut self, secs: Option<u64>) -> Self {
        self.body.retry_after_secs = secs;
        self
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError::invalid_request(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_request(rejection.body_text())
    }
}

impl From<RunEnsembleError> for ApiError {
    fn from(e: RunEnsembleError) -> Self {
        match (&e, e.uniform_kind()) {
            (RunEnsembleError::NoModels | RunEnsembleError::NothingToSynthesize, _) => {
                ApiError::invalid_request(e.to_string())
            }
            (_, Some(CallErrorKind::RateLimited)) => {
                ApiError::new(StatusCode::TOO_MANY_REQUESTS, "rate_limited", e.to_string())
                    .with_retry_after(e.retry_after_secs())
            }
            (_, Some(CallErrorKind::CircuitOpen)) => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "circuit_open", e.to_string())
                    .with_retry_after(e.retry_after_secs())
            }
            _ => ApiError::new(StatusCode::BAD_GATEWAY, "total_failure", e.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::TimeTravelDisabled => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "time_travel_disabled", e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = self
            .body
            .retry_after_secs
            .filter(|_| self.status == StatusCode::TOO_MANY_REQUESTS);
        let mut response = (self.status, Json(ErrorEnvelope { error: self.body })).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
