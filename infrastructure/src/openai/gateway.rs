//! Model Gateway over an OpenAI-compatible HTTP API

use super::error::ProviderError;
use super::protocol::{ChatRequest, error_for_status, parse_completion};
use crate::config::FileOpenAiConfig;
use async_trait::async_trait;
use ensemble_application::{Completion, CompletionRequest, GatewayError, ModelGateway};
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use std::time::Duration;
use tracing::debug;

/// HTTP adapter for chat completions
///
/// Holds one pooled client for every model. Deadlines, concurrency and
/// circuit breaking are applied by the guarded gateway wrapped around it.
pub struct OpenAiGateway {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiGateway {
    /// Build from the `[providers.openai]` section
    pub fn from_config(config: &FileOpenAiConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| ProviderError::MissingApiKey {
                env: config.api_key_env.clone(),
            })?;
        let client = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()?;
        Ok(Self::new(client, api_key, &config.base_url))
    }

    pub fn new(client: Client, api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, GatewayError> {
        debug!("POST {} model={}", self.endpoint(), request.model);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&ChatRequest::from(request))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(error_for_status(status, retry_after.as_deref(), &body));
        }
        parse_completion(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_reported_with_env_name() {
        let config = FileOpenAiConfig {
            api_key: None,
            api_key_env: "ENSEMBLE_TEST_NO_SUCH_KEY".to_string(),
            ..FileOpenAiConfig::default()
        };
        match OpenAiGateway::from_config(&config) {
            Err(ProviderError::MissingApiKey { env }) => assert_eq!(env, "ENSEMBLE_TEST_NO_SUCH_KEY"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected a missing key error"),
        }
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let gateway = OpenAiGateway::new(Client::new(), "sk", "http://localhost:8080/v1/");
        assert_eq!(gateway.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let gateway = OpenAiGateway::new(Client::new(), "sk", "http://127.0.0.1:9/v1");
        let request = CompletionRequest::new(ensemble_domain::Model::Gpt4o, "hi");
        let error = gateway.complete(&request).await.unwrap_err();
        assert!(matches!(error, GatewayError::Transport(_)));
    }
}
