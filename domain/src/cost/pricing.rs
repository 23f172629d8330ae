//! Per-model pricing table and token-based cost calculation.

use crate::core::model::Model;
use serde::{Deserialize, Serialize};

/// Token counts reported by a single model call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        u64::from(self.prompt_tokens) + u64::from(self.completion_tokens)
    }
}

impl std::ops::Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.saturating_add(rhs.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(rhs.completion_tokens),
        }
    }
}

/// USD price per 1,000 tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPricing {
    pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// Cost in USD of the given usage at this price
    pub fn cost(&self, usage: TokenUsage) -> f64 {
        (f64::from(usage.prompt_tokens) / 1000.0) * self.input_per_1k
            + (f64::from(usage.completion_tokens) / 1000.0) * self.output_per_1k
    }
}

/// Pricing for a catalogue model, `None` for custom model ids
pub fn pricing_for(model: &Model) -> Option<ModelPricing> {
    match model {
        Model::Gpt4oMini => Some(ModelPricing::new(0.000_15, 0.000_6)),
        Model::Gpt4o => Some(ModelPricing::new(0.002_5, 0.007_5)),
        Model::Gpt4Turbo => Some(ModelPricing::new(0.01, 0.03)),
        Model::Gpt52 => Some(ModelPricing::new(0.02, 0.06)),
        Model::Custom(_) => None,
    }
}

/// Cost in USD of one call; unpriced models cost zero
pub fn calculate_cost(model: &Model, usage: TokenUsage) -> f64 {
    pricing_for(model).map_or(0.0, |p| p.cost(usage))
}
