//! Role-based model configuration from TOML (`[models]` section)

use ensemble_application::{ConfigError, ModelSlots};
use ensemble_domain::Model;
use serde::{Deserialize, Serialize};

/// Role-based model configuration from TOML
///
/// # Example
///
/// ```toml
/// [models]
/// ensemble = ["gpt-4-turbo", "gpt-4o", "gpt-4o-mini"]
/// synthesis = "gpt-4o"
/// classifier = "gpt-4o-mini"
/// fast = "gpt-4o-mini"                 # key-change extraction, simple questions
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileModelsConfig {
    pub ensemble: Option<Vec<String>>,
    pub synthesis: Option<String>,
    pub classifier: Option<String>,
    pub fast: Option<String>,
}

fn parse_single(field: &'static str, value: Option<&String>, default: Model) -> Result<Model, ConfigError> {
    match value {
        None => Ok(default),
        Some(s) if s.trim().is_empty() => Err(ConfigError::Empty(field)),
        Some(s) => Ok(Model::from(s.as_str())),
    }
}

impl FileModelsConfig {
    /// Unset roles keep their defaults; blank names are rejected
    pub fn to_model_slots(&self) -> Result<ModelSlots, ConfigError> {
        let defaults = ModelSlots::default();

        let ensemble = match &self.ensemble {
            None => defaults.ensemble,
            Some(names) => {
                let mut models: Vec<Model> = Vec::with_capacity(names.len());
                for name in names {
                    if name.trim().is_empty() {
                        return Err(ConfigError::Empty("models.ensemble"));
                    }
                    let model = Model::from(name.as_str());
                    if !models.contains(&model) {
                        models.push(model);
                    }
                }
                models
            }
        };

        Ok(ModelSlots {
            ensemble,
            synthesis: parse_single("models.synthesis", self.synthesis.as_ref(), defaults.synthesis)?,
            classifier: parse_single("models.classifier", self.classifier.as_ref(), defaults.classifier)?,
            fast: parse_single("models.fast", self.fast.as_ref(), defaults.fast)?,
        })
    }
}
