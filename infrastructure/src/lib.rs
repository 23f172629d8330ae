//! Infrastructure layer for llm-ensemble
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer, plus configuration file loading.

pub mod config;
pub mod logging;
pub mod openai;
pub mod search;

// Re-export commonly used types
pub use config::{ConfigLoader, FileConfig, FileLoggingConfig, FileServerConfig};
pub use logging::JsonlQueryLogger;
pub use openai::{error::ProviderError, gateway::OpenAiGateway};
pub use search::{FallbackSearch, PerplexitySearch, SerperSearch, TavilySearch, build_web_search};
