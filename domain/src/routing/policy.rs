//! Static routing policy tables.
//!
//! | Complexity | Models | Synthesis |
//! |------------|--------|-----------|
//! | simple | fast | no |
//! | moderate | fast + balanced | no |
//! | complex | whole ensemble | yes |
//!
//! Time-sensitive questions are raised to at least
//! [`RoutingPolicy::min_temporal_models`] models so answers can be
//! cross-checked, and carry a web-search recommendation.

use super::decision::RoutingDecision;
use crate::classification::entities::{Classification, Complexity};
use crate::core::model::Model;
use crate::cost::estimate::{Savings, baseline_cost, estimate_cost, estimate_time};
use serde::{Deserialize, Serialize};

/// Caller-supplied adjustments applied after the policy table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteOverrides {
    /// Replace the policy's model list
    pub models: Option<Vec<Model>>,
    /// Force synthesis on or off
    pub force_synthesis: Option<bool>,
}

/// Model slots the policy table routes between
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    pub fast: Model,
    pub balanced: Model,
    /// Every model called for complex questions, in invocation order
    pub ensemble: Vec<Model>,
    pub synthesis: Model,
    pub min_temporal_models: usize,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            fast: Model::Gpt4oMini,
            balanced: Model::Gpt4o,
            ensemble: Model::default_ensemble(),
            synthesis: Model::default_synthesis(),
            min_temporal_models: 2,
        }
    }
}

impl RoutingPolicy {
    /// Route a classification with no overrides
    pub fn route(&self, classification: &Classification) -> RoutingDecision {
        self.route_with(classification, &RouteOverrides::default())
    }

    /// Route a classification, then apply caller overrides
    pub fn route_with(
        &self,
        classification: &Classification,
        overrides: &RouteOverrides,
    ) -> RoutingDecision {
        let (mut models, mut use_synthesis, mut rationale) = match classification.complexity {
            Complexity::Simple => (
                vec![self.fast.clone()],
                false,
                "Simple question: single fast model".to_string(),
            ),
            Complexity::Moderate => (
                vec![self.fast.clone(), self.balanced.clone()],
                false,
                "Moderate question: fast and balanced models".to_string(),
            ),
            Complexity::Complex => (
                self.ensemble.clone(),
                true,
                "Complex question: full ensemble with synthesis".to_string(),
            ),
        };

        let time_sensitive = classification.is_time_sensitive();
        if time_sensitive && models.len() < self.min_temporal_models {
            let candidates = std::iter::once(&self.balanced).chain(self.ensemble.iter());
            for candidate in candidates {
                if models.len() >= self.min_temporal_models {
                    break;
                }
                if !models.contains(candidate) {
                    models.push(candidate.clone());
                }
            }
            rationale.push_str(&format!(
                "; time-sensitive, raised to {} models for cross-checking",
                models.len()
            ));
        }

        if let Some(requested) = &overrides.models {
            models = requested.clone();
            use_synthesis = models.len() > 1;
            rationale = format!("Caller selected {} model(s)", models.len());
        }
        dedup_in_order(&mut models);

        if let Some(force) = overrides.force_synthesis {
            use_synthesis = force;
            rationale.push_str(if force {
                "; synthesis forced on"
            } else {
                "; synthesis forced off"
            });
        }
        if models.is_empty() {
            use_synthesis = false;
        }

        let synthesis_model = use_synthesis.then(|| self.synthesis.clone());
        let estimated_cost = estimate_cost(&models, synthesis_model.as_ref());
        let baseline = baseline_cost(&self.ensemble, &self.synthesis);
        let estimated_time = estimate_time(&models, synthesis_model.as_ref());

        RoutingDecision {
            estimated_savings: Savings::against(estimated_cost.total_cost, baseline),
            models_to_use: models,
            use_synthesis,
            synthesis_model,
            rationale,
            recommend_search: time_sensitive && classification.requires_search,
            estimated_cost,
            estimated_time_ms: u64::try_from(estimated_time.as_millis()).unwrap_or(u64::MAX),
            baseline_cost: baseline,
        }
    }
}

fn dedup_in_order(models: &mut Vec<Model>) {
    let mut seen = std::collections::HashSet::new();
    models.retain(|m| seen.insert(m.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::entities::{Intent, QueryDomain, TemporalScope};

    fn classification(complexity: Complexity) -> Classification {
        Classification {
            complexity,
            intent: Intent::Factual,
            domain: QueryDomain::General,
            temporal_scope: TemporalScope::Evergreen,
            requires_search: false,
            confidence: 0.9,
            recommended_models: vec![],
            reasoning: String::new(),
            fallback_used: false,
            fallback_reason: None,
        }
    }

    #[test]
    fn test_simple_routes_to_single_fast_model() {
        let d = RoutingPolicy::default().route(&classification(Complexity::Simple));
        assert_eq!(d.models_to_use, vec![Model::Gpt4oMini]);
        assert!(!d.use_synthesis);
        assert!(d.synthesis_model.is_none());
        assert!(d.estimated_savings.amount > 0.0);
    }

    #[test]
    fn test_moderate_routes_to_two_models() {
        let d = RoutingPolicy::default().route(&classification(Complexity::Moderate));
        assert_eq!(d.models_to_use, vec![Model::Gpt4oMini, Model::Gpt4o]);
        assert!(!d.use_synthesis);
    }

    #[test]
    fn test_complex_uses_everything() {
        let d = RoutingPolicy::default().route(&classification(Complexity::Complex));
        assert_eq!(d.models_to_use, Model::default_ensemble());
        assert!(d.use_synthesis);
        assert_eq!(d.synthesis_model, Some(Model::Gpt4o));
        assert!(d.estimated_savings.amount.abs() < 1e-12);
    }

    #[test]
    fn test_route_is_deterministic() {
        let policy = RoutingPolicy::default();
        for complexity in [Complexity::Simple, Complexity::Moderate, Complexity::Complex] {
            let c = classification(complexity);
            assert_eq!(policy.route(&c), policy.route(&c.clone()));
        }
    }

    #[test]
    fn test_temporal_raises_model_count_and_recommends_search() {
        let mut c = classification(Complexity::Simple);
        c.temporal_scope = TemporalScope::Current;
        c.requires_search = true;

        let d = RoutingPolicy::default().route(&c);
        assert_eq!(d.models_to_use, vec![Model::Gpt4oMini, Model::Gpt4o]);
        assert!(d.recommend_search);
        assert!(d.rationale.contains("time-sensitive"));
    }

    #[test]
    fn test_model_override_dedups_and_enables_synthesis() {
        let overrides = RouteOverrides {
            models: Some(vec![Model::Gpt4o, Model::Gpt4Turbo, Model::Gpt4o]),
            force_synthesis: None,
        };
        let d = RoutingPolicy::default().route_with(&classification(Complexity::Simple), &overrides);
        assert_eq!(d.models_to_use, vec![Model::Gpt4o, Model::Gpt4Turbo]);
        assert!(d.use_synthesis);
    }

    #[test]
    fn test_force_synthesis_off() {
        let overrides = RouteOverrides {
            models: None,
            force_synthesis: Some(false),
        };
        let d = RoutingPolicy::default().route_with(&classification(Complexity::Complex), &overrides);
        assert!(!d.use_synthesis);
        assert!(d.synthesis_model.is_none());
    }

    #[test]
    fn test_force_synthesis_on_for_single_model() {
        let overrides = RouteOverrides {
            models: None,
            force_synthesis: Some(true),
        };
        let d = RoutingPolicy::default().route_with(&classification(Complexity::Simple), &overrides);
        assert!(d.use_synthesis);
        assert_eq!(d.synthesis_model, Some(Model::Gpt4o));
    }
}
