//! Raw TOML configuration data types
//!
//! These structs mirror the TOML file exactly. Every section is
//! `#[serde(default)]`, so a partial file only overrides what it names.

mod logging;
mod models;
mod providers;
mod runtime;
mod server;

pub use logging::FileLoggingConfig;
pub use models::FileModelsConfig;
pub use providers::{
    FileOpenAiConfig, FilePerplexityConfig, FileProvidersConfig, FileSerperConfig, FileTavilyConfig,
};
pub use runtime::{
    FileClassifierConfig, FileGatewayConfig, FileRateLimitConfig, FileTimeTravelConfig,
};
pub use server::FileServerConfig;

use ensemble_application::{ConfigError, EnsembleConfig};
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: FileServerConfig,
    pub providers: FileProvidersConfig,
    /// Role-based model selection
    pub models: FileModelsConfig,
    pub gateway: FileGatewayConfig,
    pub classifier: FileClassifierConfig,
    pub time_travel: FileTimeTravelConfig,
    pub rate_limit: FileRateLimitConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Convert into validated runtime configuration
    pub fn to_ensemble_config(&self) -> Result<EnsembleConfig, ConfigError> {
        let config = EnsembleConfig::default()
            .with_models(self.models.to_model_slots()?)
            .with_gateway(self.gateway.to_params())
            .with_classifier(self.classifier.to_params())
            .with_time_travel(self.time_travel.to_params())
            .with_rate_limit(self.rate_limit.to_params());
        config.validate()?;
        Ok(config)
    }
}
