//! Configuration file loading for llm-ensemble
//!
//! This module handles file I/O and merging of configuration from multiple
//! sources. The priority order (highest to lowest):
//!
//! 1. Environment variables: `ENSEMBLE_<SECTION>__<KEY>`
//! 2. `--config <path>` specified file
//! 3. Project root: `./ensemble.toml` or `./.ensemble.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/llm-ensemble/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileClassifierConfig, FileConfig, FileGatewayConfig, FileLoggingConfig, FileModelsConfig,
    FileOpenAiConfig, FilePerplexityConfig, FileProvidersConfig, FileRateLimitConfig,
    FileSerperConfig, FileServerConfig, FileTavilyConfig, FileTimeTravelConfig,
};
pub use loader::ConfigLoader;
