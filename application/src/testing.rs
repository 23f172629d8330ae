//! Scripted in-memory gateway for use-case tests.

use crate::ports::model_gateway::{Completion, CompletionRequest, GatewayError, ModelGateway};
use async_trait::async_trait;
use ensemble_domain::{Model, TokenUsage};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const SCRIPTED_USAGE: TokenUsage = TokenUsage {
    prompt_tokens: 100,
    completion_tokens: 200,
};

#[derive(Clone)]
struct Outcome {
    result: Result<String, GatewayError>,
    delay: Duration,
}

/// Replies chosen by prompt text first, then by model
#[derive(Default)]
pub struct ScriptedGateway {
    by_needle: Vec<(String, Outcome)>,
    by_model: Vec<(Model, Outcome)>,
    calls: Mutex<Vec<CompletionRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, model: Model, text: &str) -> Self {
        self.reply_after(model, text, Duration::ZERO)
    }

    pub fn reply_after(mut self, model: Model, text: &str, delay: Duration) -> Self {
        self.by_model.push((
            model,
            Outcome {
                result: Ok(text.to_string()),
                delay,
            },
        ));
        self
    }

    pub fn fail(self, model: Model, error: GatewayError) -> Self {
        self.fail_after(model, error, Duration::ZERO)
    }

    pub fn fail_after(mut self, model: Model, error: GatewayError, delay: Duration) -> Self {
        self.by_model.push((
            model,
            Outcome {
                result: Err(error),
                delay,
            },
        ));
        self
    }

    /// Reply to any request whose system or user prompt contains `needle`
    pub fn reply_to(self, needle: &str, text: &str) -> Self {
        self.reply_to_after(needle, text, Duration::ZERO)
    }

    pub fn reply_to_after(mut self, needle: &str, text: &str, delay: Duration) -> Self {
        self.by_needle.push((
            needle.to_string(),
            Outcome {
                result: Ok(text.to_string()),
                delay,
            },
        ));
        self
    }

    pub fn fail_to(mut self, needle: &str, error: GatewayError) -> Self {
        self.by_needle.push((
            needle.to_string(),
            Outcome {
                result: Err(error),
                delay: Duration::ZERO,
            },
        ));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, model: &Model) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.model == model)
            .count()
    }

    pub fn calls_containing(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| matches_needle(r, needle))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn outcome_for(&self, request: &CompletionRequest) -> Outcome {
        let by_needle = self
            .by_needle
            .iter()
            .find(|(needle, _)| matches_needle(request, needle))
            .map(|(_, o)| o);
        let by_model = self
            .by_model
            .iter()
            .find(|(m, _)| m == &request.model)
            .map(|(_, o)| o);
        by_needle.or(by_model).cloned().unwrap_or(Outcome {
            result: Err(GatewayError::Upstream {
                status: 404,
                message: format!("no scripted reply for {}", request.model),
            }),
            delay: Duration::ZERO,
        })
    }
}

fn matches_needle(request: &CompletionRequest, needle: &str) -> bool {
    request.prompt.contains(needle)
        || request
            .system
            .as_deref()
            .is_some_and(|system| system.contains(needle))
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, GatewayError> {
        self.calls.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let outcome = self.outcome_for(request);
        if !outcome.delay.is_zero() {
            tokio::time::sleep(outcome.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
            .result
            .map(|text| Completion::new(text, SCRIPTED_USAGE))
    }
}
