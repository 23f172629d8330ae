//! Routing decision value object

use crate::cost::estimate::{CostEstimate, Savings};
use crate::core::model::Model;
use serde::{Deserialize, Serialize};

/// Which models to call for one request and how to combine them
///
/// Computed deterministically from a classification; lives only for the
/// request that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Unique model ids, in invocation order
    pub models_to_use: Vec<Model>,
    pub use_synthesis: bool,
    /// Present iff `use_synthesis`
    pub synthesis_model: Option<Model>,
    pub rationale: String,
    /// The question looks like it needs live data
    pub recommend_search: bool,
    pub estimated_cost: CostEstimate,
    pub estimated_time_ms: u64,
    /// Estimated cost of calling every ensemble model plus synthesis
    pub baseline_cost: f64,
    pub estimated_savings: Savings,
}

impl RoutingDecision {
    pub fn model_count(&self) -> usize {
        self.models_to_use.len()
    }
}
