//! Model value object representing a hosted chat-completion model

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Capability/price tier of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Cheapest and quickest; used for classification and simple answers
    Fast,
    Balanced,
    Premium,
    /// Opt-in, never part of the default ensemble
    Flagship,
}

/// Hosted models the ensemble knows how to price and route (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Model {
    Gpt4oMini,
    Gpt4o,
    Gpt4Turbo,
    Gpt52,
    /// Any other model id; callable but unpriced
    Custom(String),
}

impl Model {
    /// Every model in the built-in catalogue
    pub const CATALOGUE: [Model; 4] = [Model::Gpt4oMini, Model::Gpt4o, Model::Gpt4Turbo, Model::Gpt52];

    /// Get the string identifier for this model
    pub fn as_str(&self) -> &str {
        match self {
            Model::Gpt4oMini => "gpt-4o-mini",
            Model::Gpt4o => "gpt-4o",
            Model::Gpt4Turbo => "gpt-4-turbo",
            Model::Gpt52 => "gpt-5.2",
            Model::Custom(s) => s,
        }
    }

    /// Human-readable name for listings
    pub fn display_name(&self) -> &str {
        match self {
            Model::Gpt4oMini => "GPT-4o Mini",
            Model::Gpt4o => "GPT-4o",
            Model::Gpt4Turbo => "GPT-4 Turbo",
            Model::Gpt52 => "GPT-5.2",
            Model::Custom(s) => s,
        }
    }

    /// Default ensemble, most capable first
    pub fn default_ensemble() -> Vec<Model> {
        vec![Model::Gpt4Turbo, Model::Gpt4o, Model::Gpt4oMini]
    }

    /// Default model for merging ensemble answers
    pub fn default_synthesis() -> Model {
        Model::Gpt4o
    }

    /// Default model for classification and other cheap structured calls
    pub fn default_fast() -> Model {
        Model::Gpt4oMini
    }

    pub fn tier(&self) -> ModelTier {
        match self {
            Model::Gpt4oMini => ModelTier::Fast,
            Model::Gpt4o | Model::Custom(_) => ModelTier::Balanced,
            Model::Gpt4Turbo => ModelTier::Premium,
            Model::Gpt52 => ModelTier::Flagship,
        }
    }

    /// Whether this model is part of the built-in catalogue
    pub fn is_known(&self) -> bool {
        !matches!(self, Model::Custom(_))
    }

    /// Rough wall-clock estimate for one answer, used for routing previews
    pub fn estimated_latency(&self) -> Duration {
        match self {
            Model::Gpt4oMini => Duration::from_millis(1500),
            Model::Gpt4o | Model::Custom(_) => Duration::from_millis(3000),
            Model::Gpt4Turbo => Duration::from_millis(5000),
            Model::Gpt52 => Duration::from_millis(4000),
        }
    }

    /// Preference order when picking a single answer without synthesis
    /// (lower is preferred)
    pub fn answer_priority(&self) -> u8 {
        match self.tier() {
            ModelTier::Flagship => 0,
            ModelTier::Premium => 1,
            ModelTier::Balanced => 2,
            ModelTier::Fast => 3,
        }
    }
}

impl Default for Model {
    /// Returns the default single model (GPT-4o Mini)
    fn default() -> Self {
        Model::Gpt4oMini
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Model {
    fn from(s: &str) -> Self {
        match s.trim() {
            "gpt-4o-mini" => Model::Gpt4oMini,
            "gpt-4o" => Model::Gpt4o,
            "gpt-4-turbo" => Model::Gpt4Turbo,
            "gpt-5.2" => Model::Gpt52,
            other => Model::Custom(other.to_string()),
        }
    }
}

impl std::str::FromStr for Model {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Model::from(s))
    }
}

impl Serialize for Model {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Model::from(s.as_str()))
    }
}
