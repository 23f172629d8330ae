//! Strict parse of a model-produced classification.
//!
//! The classifier model is asked for a JSON object. Anything that does not
//! decode into the exact schema is a [`ClassificationParseError`]; callers
//! recover by substituting [`Classification::fallback`]. Missing optional
//! fields take documented defaults only (`requires_search = false`, empty
//! reasoning); required fields are never guessed.

use super::entities::{Classification, Complexity, Intent, QueryDomain, TemporalScope};
use crate::core::model::Model;
use crate::core::string::extract_json_object;
use serde::Deserialize;
use thiserror::Error;

/// Why a classifier reply could not be used
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationParseError {
    #[error("no JSON object in classifier reply")]
    NoJson,

    #[error("classifier reply does not match schema: {0}")]
    Schema(String),

    #[error("confidence {0} outside 0.0..=1.0")]
    ConfidenceOutOfRange(f64),

    #[error("unknown recommended model `{0}`")]
    UnknownModel(String),
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    complexity: Complexity,
    intent: Intent,
    domain: QueryDomain,
    #[serde(default)]
    requires_search: bool,
    #[serde(default)]
    recommended_models: Vec<String>,
    #[serde(default)]
    reasoning: String,
    confidence: f64,
}

/// Decode a classifier reply into a [`Classification`]
pub fn parse_classification(reply: &str) -> Result<Classification, ClassificationParseError> {
    let json = extract_json_object(reply).ok_or(ClassificationParseError::NoJson)?;
    let raw: RawClassification = serde_json::from_str(json)
        .map_err(|e| ClassificationParseError::Schema(e.to_string()))?;

    if !(0.0..=1.0).contains(&raw.confidence) {
        return Err(ClassificationParseError::ConfidenceOutOfRange(raw.confidence));
    }

    let recommended_models = raw
        .recommended_models
        .iter()
        .map(|id| {
            let model = Model::from(id.as_str());
            if model.is_known() {
                Ok(model)
            } else {
                Err(ClassificationParseError::UnknownModel(id.clone()))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Classification {
        complexity: raw.complexity,
        intent: raw.intent,
        domain: raw.domain,
        temporal_scope: TemporalScope::Evergreen,
        requires_search: raw.requires_search,
        confidence: raw.confidence,
        recommended_models,
        reasoning: raw.reasoning,
        fallback_used: false,
        fallback_reason: None,
    })
}
