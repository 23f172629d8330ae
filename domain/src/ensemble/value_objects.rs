//! Ensemble value objects - immutable result types for one fan-out.
//!
//! - [`ModelCallResult`] - outcome of a single model call, success or failure
//! - [`CallErrorKind`] - machine-readable failure class of a call
//! - [`EnsembleResult`] - every response of one fan-out plus optional synthesis

use crate::core::model::Model;
use crate::cost::pricing::{TokenUsage, calculate_cost};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Failure class of a single model call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorKind {
    Timeout,
    RateLimited,
    Transport,
    Upstream,
    CircuitOpen,
    Cancelled,
    /// The task running the call ended abnormally
    Internal,
}

impl CallErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallErrorKind::Timeout => "timeout",
            CallErrorKind::RateLimited => "rate_limited",
            CallErrorKind::Transport => "transport",
            CallErrorKind::Upstream => "upstream",
            CallErrorKind::CircuitOpen => "circuit_open",
            CallErrorKind::Cancelled => "cancelled",
            CallErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for CallErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one model call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCallResult {
    pub model: Model,
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// USD; always zero for failed calls
    pub cost: f64,
    pub latency_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<CallErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Provider's back-off hint for rate-limited or circuit-open failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ModelCallResult {
    /// A successful call, priced from the model's pricing table
    pub fn success(model: Model, text: impl Into<String>, usage: TokenUsage, latency: Duration) -> Self {
        let cost = calculate_cost(&model, usage);
        Self {
            model,
            text: text.into(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            cost,
            latency_ms: duration_ms(latency),
            success: true,
            error_kind: None,
            error: None,
            retry_after_secs: None,
        }
    }

    /// A failed call carrying its failure class and message
    pub fn failure(
        model: Model,
        kind: CallErrorKind,
        message: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            model,
            text: String::new(),
            prompt_tokens: 0,
            completion_tokens: 0,
            cost: 0.0,
            latency_ms: duration_ms(latency),
            success: false,
            error_kind: Some(kind),
            error: Some(message.into()),
            retry_after_secs: None,
        }
    }

    /// Attach a back-off hint, rounded up to whole seconds
    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after_secs = retry_after.map(|d| d.as_secs() + u64::from(d.subsec_nanos() > 0));
        self
    }

    pub fn usage(&self) -> TokenUsage {
        TokenUsage::new(self.prompt_tokens, self.completion_tokens)
    }

    pub fn total_tokens(&self) -> u64 {
        self.usage().total()
    }
}

/// Merged result of one fan-out
///
/// `responses` keep invocation order. `synthesis` is only ever built from
/// successful responses and is absent when synthesis was not requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub question: String,
    pub responses: Vec<ModelCallResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<ModelCallResult>,
    pub total_cost: f64,
    pub total_time_ms: u64,
}

impl EnsembleResult {
    pub fn new(
        question: impl Into<String>,
        responses: Vec<ModelCallResult>,
        synthesis: Option<ModelCallResult>,
        total_time: Duration,
    ) -> Self {
        let total_cost = responses
            .iter()
            .chain(synthesis.iter())
            .filter(|r| r.success)
            .map(|r| r.cost)
            .sum();

        Self {
            question: question.into(),
            responses,
            synthesis,
            total_cost,
            total_time_ms: duration_ms(total_time),
        }
    }

    /// Successful responses in invocation order
    pub fn successful(&self) -> impl Iterator<Item = &ModelCallResult> {
        self.responses.iter().filter(|r| r.success)
    }

    pub fn success_count(&self) -> usize {
        self.successful().count()
    }

    pub fn failure_count(&self) -> usize {
        self.responses.len() - self.success_count()
    }

    /// Some but not all calls failed
    pub fn is_partial_failure(&self) -> bool {
        let failed = self.failure_count();
        failed > 0 && failed < self.responses.len()
    }

    pub fn total_tokens(&self) -> u64 {
        self.responses
            .iter()
            .chain(self.synthesis.iter())
            .map(ModelCallResult::total_tokens)
            .sum()
    }

    /// Synthesis cost, zero when absent or failed
    pub fn synthesis_cost(&self) -> f64 {
        self.synthesis
            .as_ref()
            .filter(|s| s.success)
            .map_or(0.0, |s| s.cost)
    }

    /// The single answer to show: a successful synthesis, otherwise the
    /// successful response from the most capable model
    pub fn final_answer(&self) -> Option<&ModelCallResult> {
        if let Some(synthesis) = self.synthesis.as_ref().filter(|s| s.success) {
            return Some(synthesis);
        }
        self.successful().min_by_key(|r| r.model.answer_priority())
    }
}

/// Whole milliseconds, saturating for durations past `u64::MAX` ms
pub fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
