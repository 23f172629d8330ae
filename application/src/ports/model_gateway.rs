//! Model Gateway port
//!
//! Defines the interface for calling a hosted chat-completion model.

use async_trait::async_trait;
use ensemble_domain::{CallErrorKind, Model, TokenUsage};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during a model call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Circuit open for {model}, retry in {retry_in:?}")]
    CircuitOpen { model: String, retry_in: Duration },

    #[error("Call cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Serialisable classification of this error
    pub fn kind(&self) -> CallErrorKind {
        match self {
            GatewayError::Timeout(_) => CallErrorKind::Timeout,
            GatewayError::RateLimited { .. } => CallErrorKind::RateLimited,
            GatewayError::Transport(_) => CallErrorKind::Transport,
            GatewayError::Upstream { .. } => CallErrorKind::Upstream,
            GatewayError::CircuitOpen { .. } => CallErrorKind::CircuitOpen,
            GatewayError::Cancelled => CallErrorKind::Cancelled,
        }
    }

    /// How long the caller should back off, when the failure says so
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after } => *retry_after,
            GatewayError::CircuitOpen { retry_in, .. } => Some(*retry_in),
            _ => None,
        }
    }

    /// Whether this failure says something about the model's health
    ///
    /// Cancellations and breaker rejections never reached the provider.
    pub fn counts_against_breaker(&self) -> bool {
        !matches!(
            self,
            GatewayError::Cancelled | GatewayError::CircuitOpen { .. }
        )
    }
}

/// One chat-completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: Model,
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the provider for a JSON object response
    pub json_mode: bool,
    /// Overrides the gateway's default per-call timeout
    pub timeout: Option<Duration>,
}

impl CompletionRequest {
    pub fn new(model: Model, prompt: impl Into<String>) -> Self {
        Self {
            model,
            system: None,
            prompt: prompt.into(),
            max_tokens: 2000,
            temperature: 0.7,
            json_mode: false,
            timeout: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A successful completion
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

impl Completion {
    pub fn new(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            text: text.into(),
            usage,
        }
    }
}

/// Gateway for model calls
///
/// This port defines how the application layer talks to model providers.
/// Implementations (adapters) live in the infrastructure layer. Adapters do
/// not retry, rate-limit, or time out on their own; the
/// [`GuardedGateway`](crate::resilience::GuardedGateway) wraps them with
/// those policies.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Issue one completion call
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            GatewayError::Timeout(Duration::from_secs(1)).kind(),
            CallErrorKind::Timeout
        );
        assert_eq!(
            GatewayError::RateLimited { retry_after: None }.kind(),
            CallErrorKind::RateLimited
        );
        assert_eq!(
            GatewayError::Upstream {
                status: 500,
                message: "boom".into()
            }
            .kind(),
            CallErrorKind::Upstream
        );
        assert_eq!(GatewayError::Cancelled.kind(), CallErrorKind::Cancelled);
    }

    #[test]
    fn test_breaker_accounting() {
        assert!(GatewayError::Transport("reset".into()).counts_against_breaker());
        assert!(!GatewayError::Cancelled.counts_against_breaker());
        assert!(
            !GatewayError::CircuitOpen {
                model: "gpt-4o".into(),
                retry_in: Duration::from_secs(1)
            }
            .counts_against_breaker()
        );
    }

    #[test]
    fn test_retry_after_hint() {
        let limited = GatewayError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(GatewayError::Transport("reset".into()).retry_after(), None);
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new(Model::Gpt4o, "hi")
            .with_system("sys")
            .with_max_tokens(300)
            .with_temperature(0.1)
            .with_json_mode();
        assert_eq!(request.system.as_deref(), Some("sys"));
        assert_eq!(request.max_tokens, 300);
        assert!(request.json_mode);
        assert!(request.timeout.is_none());
    }
}
