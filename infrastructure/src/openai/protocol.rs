//! Wire types for the chat completions API.
//!
//! Only the fields the gateway reads are modelled; unknown fields are
//! ignored so compatible servers with extra output still parse.

use ensemble_application::{Completion, CompletionRequest, GatewayError};
use ensemble_domain::TokenUsage;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// `POST /chat/completions` body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl From<&CompletionRequest> for ChatRequest {
    fn from(request: &CompletionRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(Message {
                role: Role::System,
                content: system.clone(),
            });
        }
        messages.push(Message {
            role: Role::User,
            content: request.prompt.clone(),
        });

        Self {
            model: request.model.as_str().to_string(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Parse a successful response body into a completion
pub fn parse_completion(body: &str) -> Result<Completion, GatewayError> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|e| GatewayError::Upstream {
        status: 200,
        message: format!("malformed response: {e}"),
    })?;
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| GatewayError::Upstream {
            status: 200,
            message: "response has no message content".to_string(),
        })?;
    let usage = response.usage.unwrap_or_default();
    Ok(Completion::new(
        text,
        TokenUsage::new(usage.prompt_tokens, usage.completion_tokens),
    ))
}

/// Map a non-success status into a gateway error
///
/// 429 becomes `RateLimited`, honouring a numeric `Retry-After`. Everything
/// else is `Upstream` with the provider's error message when it sent one.
pub fn error_for_status(status: StatusCode, retry_after: Option<&str>, body: &str) -> GatewayError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return GatewayError::RateLimited { retry_after };
    }

    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        });

    GatewayError::Upstream {
        status: status.as_u16(),
        message,
    }
}
