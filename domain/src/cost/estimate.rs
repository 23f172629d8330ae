//! Pre-flight cost/time estimates and savings against the full-ensemble baseline.

use super::pricing::{TokenUsage, calculate_cost};
use crate::core::model::Model;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Assumed prompt size of one ensemble call
pub const ESTIMATED_PROMPT_TOKENS: u32 = 500;
/// Assumed answer size of one ensemble call
pub const ESTIMATED_COMPLETION_TOKENS: u32 = 1000;
/// Assumed answer size of one synthesis call
pub const ESTIMATED_SYNTHESIS_COMPLETION_TOKENS: u32 = 800;

/// Estimated usage of a synthesis call that embeds `responses` answers
pub fn synthesis_usage_estimate(responses: usize) -> TokenUsage {
    let prompt = u32::try_from(responses)
        .unwrap_or(u32::MAX)
        .saturating_mul(ESTIMATED_COMPLETION_TOKENS)
        .saturating_add(ESTIMATED_PROMPT_TOKENS);
    TokenUsage::new(prompt, ESTIMATED_SYNTHESIS_COMPLETION_TOKENS)
}

/// Expected cost of a routing plan before any call is made
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub models_cost: f64,
    pub synthesis_cost: f64,
    pub total_cost: f64,
}

/// Estimate the cost of calling `models` and optionally synthesizing with `synthesis`
pub fn estimate_cost(models: &[Model], synthesis: Option<&Model>) -> CostEstimate {
    let per_call = TokenUsage::new(ESTIMATED_PROMPT_TOKENS, ESTIMATED_COMPLETION_TOKENS);
    let models_cost: f64 = models.iter().map(|m| calculate_cost(m, per_call)).sum();
    let synthesis_cost =
        synthesis.map_or(0.0, |s| calculate_cost(s, synthesis_usage_estimate(models.len())));

    CostEstimate {
        models_cost,
        synthesis_cost,
        total_cost: models_cost + synthesis_cost,
    }
}

/// Cost of the "always call everything" plan: every ensemble model plus synthesis
pub fn baseline_cost(ensemble: &[Model], synthesis: &Model) -> f64 {
    estimate_cost(ensemble, Some(synthesis)).total_cost
}

/// Expected wall-clock time: models run in parallel, synthesis runs after
pub fn estimate_time(models: &[Model], synthesis: Option<&Model>) -> Duration {
    let fan_out = models
        .iter()
        .map(Model::estimated_latency)
        .max()
        .unwrap_or_default();
    fan_out + synthesis.map_or(Duration::ZERO, Model::estimated_latency)
}

/// Money saved relative to a baseline
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Savings {
    pub amount: f64,
    pub percent: f64,
}

impl Savings {
    /// `max(0, baseline - actual)` and its share of the baseline in percent
    pub fn against(actual: f64, baseline: f64) -> Self {
        let amount = (baseline - actual).max(0.0);
        let percent = if baseline > 0.0 {
            amount / baseline * 100.0
        } else {
            0.0
        };
        Self { amount, percent }
    }
}

/// Actual cost of a routed request, split by stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub classification_cost: f64,
    pub models_cost: f64,
    pub synthesis_cost: f64,
    pub search_cost: f64,
    pub total_cost: f64,
    pub baseline_cost: f64,
    pub savings: f64,
    pub savings_percent: f64,
}

impl CostBreakdown {
    pub fn new(models_cost: f64, synthesis_cost: f64, baseline_cost: f64) -> Self {
        Self {
            models_cost,
            synthesis_cost,
            baseline_cost,
            ..Default::default()
        }
        .recompute()
    }

    pub fn with_classification(mut self, cost: f64) -> Self {
        self.classification_cost = cost;
        self.recompute()
    }

    pub fn with_search(mut self, cost: f64) -> Self {
        self.search_cost = cost;
        self.recompute()
    }

    fn recompute(mut self) -> Self {
        self.total_cost =
            self.classification_cost + self.models_cost + self.synthesis_cost + self.search_cost;
        let savings = Savings::against(self.total_cost, self.baseline_cost);
        self.savings = savings.amount;
        self.savings_percent = savings.percent;
        self
    }
}
