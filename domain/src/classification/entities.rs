//! Classification value objects

use crate::core::model::Model;
use serde::{Deserialize, Serialize};

/// How much reasoning a question needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Complexity::Simple),
            "moderate" => Ok(Complexity::Moderate),
            "complex" => Ok(Complexity::Complex),
            other => Err(format!("unknown complexity `{other}`")),
        }
    }
}

/// What the user wants done with the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Factual,
    Creative,
    Analytical,
    Procedural,
    Comparative,
}

/// Subject area of the question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryDomain {
    Coding,
    Technical,
    General,
    Creative,
    Research,
}

/// Which period of time a question is about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalScope {
    /// Answer does not depend on when it is asked
    #[default]
    Evergreen,
    Current,
    Historical,
    Future,
}

/// Output of the keyword/year temporal heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalSignal {
    pub is_temporal: bool,
    pub scope: TemporalScope,
    pub requires_current_data: bool,
    pub keywords: Vec<String>,
    pub years: Vec<i32>,
    pub confidence: f64,
    pub reasoning: String,
}

/// Structural classification of a question
///
/// Produced by the classifier model call, or by [`Classification::fallback`]
/// when that call or its parse fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub complexity: Complexity,
    pub intent: Intent,
    pub domain: QueryDomain,
    pub temporal_scope: TemporalScope,
    /// The question needs data newer than the models' training cut-off
    pub requires_search: bool,
    pub confidence: f64,
    pub recommended_models: Vec<Model>,
    pub reasoning: String,
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl Classification {
    /// Fail-open default: treat the question as complex and recommend every model
    pub fn fallback(reason: impl Into<String>, all_models: &[Model]) -> Self {
        let reason = reason.into();
        Self {
            complexity: Complexity::Complex,
            intent: Intent::Analytical,
            domain: QueryDomain::General,
            temporal_scope: TemporalScope::Evergreen,
            requires_search: false,
            confidence: 0.0,
            recommended_models: all_models.to_vec(),
            reasoning: format!("Classification unavailable, using full ensemble: {reason}"),
            fallback_used: true,
            fallback_reason: Some(reason),
        }
    }

    /// Fold the keyword/year heuristic into this classification
    ///
    /// Temporal questions are never `simple`, and a heuristic demand for
    /// current data always sets `requires_search`.
    pub fn merge_temporal(mut self, signal: &TemporalSignal) -> Self {
        if !signal.is_temporal {
            return self;
        }
        if self.complexity == Complexity::Simple {
            self.complexity = Complexity::Moderate;
        }
        self.temporal_scope = signal.scope;
        self.requires_search |= signal.requires_current_data;
        self
    }

    /// Whether the question is about current or future events
    pub fn is_time_sensitive(&self) -> bool {
        self.requires_search
            || matches!(
                self.temporal_scope,
                TemporalScope::Current | TemporalScope::Future
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(scope: TemporalScope, current: bool) -> TemporalSignal {
        TemporalSignal {
            is_temporal: true,
            scope,
            requires_current_data: current,
            keywords: vec!["latest".to_string()],
            years: vec![],
            confidence: 0.85,
            reasoning: String::new(),
        }
    }

    fn simple() -> Classification {
        Classification {
            complexity: Complexity::Simple,
            intent: Intent::Factual,
            domain: QueryDomain::General,
            temporal_scope: TemporalScope::Evergreen,
            requires_search: false,
            confidence: 0.9,
            recommended_models: vec![Model::Gpt4oMini],
            reasoning: "lookup".to_string(),
            fallback_used: false,
            fallback_reason: None,
        }
    }

    #[test]
    fn test_fallback_is_complex_with_all_models() {
        let c = Classification::fallback("timeout", &Model::default_ensemble());
        assert_eq!(c.complexity, Complexity::Complex);
        assert_eq!(c.recommended_models, Model::default_ensemble());
        assert!(c.fallback_used);
        assert_eq!(c.fallback_reason.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_merge_temporal_bumps_simple() {
        let merged = simple().merge_temporal(&signal(TemporalScope::Current, true));
        assert_eq!(merged.complexity, Complexity::Moderate);
        assert_eq!(merged.temporal_scope, TemporalScope::Current);
        assert!(merged.requires_search);
        assert!(merged.is_time_sensitive());
    }

    #[test]
    fn test_merge_non_temporal_is_noop() {
        let mut s = signal(TemporalScope::Evergreen, false);
        s.is_temporal = false;
        assert_eq!(simple().merge_temporal(&s), simple());
    }

    #[test]
    fn test_complexity_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Complexity::Moderate).unwrap(),
            "\"moderate\""
        );
        assert_eq!("complex".parse::<Complexity>(), Ok(Complexity::Complex));
        assert!("hard".parse::<Complexity>().is_err());
    }
}
