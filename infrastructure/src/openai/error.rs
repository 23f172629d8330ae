//! Error types for building HTTP provider adapters

use thiserror::Error;

/// Errors raised while constructing a provider client
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("No API key: set {env} or the api_key field")]
    MissingApiKey { env: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
