//! Request bodies and their validation.
//!
//! Bodies deserialize leniently (every knob optional) and are then checked
//! against the same bounds the model calls are issued with.

use chrono::{DateTime, Utc};
use ensemble_application::SynthesizeInput;
use ensemble_domain::{DomainError, Model, ModelCallResult, Question};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const MAX_TOKENS_RANGE: (u32, u32) = (100, 4000);
pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
pub const SYNTHESIS_MAX_TOKENS_RANGE: (u32, u32) = (100, 3000);

#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleRequest {
    pub question: String,
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteAndAnswerRequest {
    pub question: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default, alias = "models")]
    pub override_models: Option<Vec<String>>,
    #[serde(default)]
    pub force_synthesis: Option<bool>,
    #[serde(default)]
    pub enable_search: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeTravelRequest {
    pub question: String,
    #[serde(default, alias = "force_time_travel")]
    pub force: bool,
}

/// One answer gathered elsewhere, as supplied to `/api/synthesize`
#[derive(Debug, Clone, Deserialize)]
pub struct SuppliedAnswer {
    #[serde(default, alias = "model_name")]
    pub model: String,
    #[serde(default, alias = "response")]
    pub text: String,
    #[serde(default = "answered")]
    pub success: bool,
}

fn answered() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesizeRequest {
    pub question: String,
    #[serde(default, alias = "model_responses")]
    pub answers: Vec<SuppliedAnswer>,
    #[serde(default)]
    pub synthesis_model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl SynthesizeRequest {
    /// Successful answers as (label, text) pairs
    pub fn supplied(&self) -> Vec<(String, String)> {
        self.answers
            .iter()
            .filter(|a| a.success)
            .map(|a| (a.model.clone(), a.text.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthesizeResponse {
    pub synthesis: ModelCallResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearCacheResponse {
    pub cleared: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetStatsResponse {
    pub message: &'static str,
    pub reset_at: DateTime<Utc>,
}

/// Generation limits after defaults and bounds checks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Limits {
    pub fn resolve(max_tokens: Option<u32>, temperature: Option<f32>) -> Result<Self, DomainError> {
        let max_tokens = max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let (min, max) = MAX_TOKENS_RANGE;
        if !(min..=max).contains(&max_tokens) {
            return Err(DomainError::InvalidParameter {
                name: "max_tokens",
                reason: format!("{} is outside {}..={}", max_tokens, min, max),
            });
        }

        let temperature = temperature.unwrap_or(DEFAULT_TEMPERATURE);
        let (low, high) = TEMPERATURE_RANGE;
        if !(low..=high).contains(&temperature) {
            return Err(DomainError::InvalidParameter {
                name: "temperature",
                reason: format!("{} is outside {}..={}", temperature, low, high),
            });
        }

        Ok(Self {
            max_tokens,
            temperature,
        })
    }
}

pub fn parse_question(raw: &str) -> Result<Question, DomainError> {
    Question::new(raw)
}

/// Synthesis budget, defaulting to [`SynthesizeInput::DEFAULT_MAX_TOKENS`]
pub fn synthesis_max_tokens(max_tokens: Option<u32>) -> Result<u32, DomainError> {
    let max_tokens = max_tokens.unwrap_or(SynthesizeInput::DEFAULT_MAX_TOKENS);
    let (min, max) = SYNTHESIS_MAX_TOKENS_RANGE;
    if !(min..=max).contains(&max_tokens) {
        return Err(DomainError::InvalidParameter {
            name: "max_tokens",
            reason: format!("{} is outside {}..={}", max_tokens, min, max),
        });
    }
    Ok(max_tokens)
}

pub fn parse_model(id: &str) -> Result<Model, DomainError> {
    let model = Model::from(id);
    if model.is_known() {
        Ok(model)
    } else {
        Err(DomainError::UnknownModel(id.trim().to_string()))
    }
}

/// Catalogue models in first-seen order
///
/// An absent or empty list yields `None` so the caller's default applies.
pub fn parse_models(ids: Option<&[String]>) -> Result<Option<Vec<Model>>, DomainError> {
    let Some(ids) = ids.filter(|ids| !ids.is_empty()) else {
        return Ok(None);
    };

    let mut models: Vec<Model> = Vec::with_capacity(ids.len());
    for id in ids {
        let model = parse_model(id)?;
        if !models.contains(&model) {
            models.push(model);
        }
    }
    Ok(Some(models))
}
