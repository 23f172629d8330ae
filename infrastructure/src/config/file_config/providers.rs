//! Provider configuration from TOML (`[providers]` section)

use serde::{Deserialize, Serialize};

/// Resolve an API key: the inline value wins, then the named env var
fn resolve_key(inline: Option<&String>, env_var: &str) -> Option<String> {
    inline
        .filter(|k| !k.trim().is_empty())
        .cloned()
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.trim().is_empty()))
}

/// OpenAI-compatible chat completions provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOpenAiConfig {
    /// Environment variable name for the API key (default: "OPENAI_API_KEY").
    pub api_key_env: String,
    /// Direct API key (not recommended, use the env var instead).
    pub api_key: Option<String>,
    /// Base URL, including the version prefix.
    pub base_url: String,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

impl Default for FileOpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            pool_max_idle_per_host: 10,
            pool_idle_timeout_seconds: 90,
            connect_timeout_seconds: 10,
        }
    }
}

impl FileOpenAiConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_ref(), &self.api_key_env)
    }
}

/// Perplexity web search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePerplexityConfig {
    /// Environment variable name for the API key (default: "PERPLEXITY_API_KEY").
    pub api_key_env: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// "day", "week", "month" or "year"
    pub recency_filter: String,
}

impl Default for FilePerplexityConfig {
    fn default() -> Self {
        Self {
            api_key_env: "PERPLEXITY_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.perplexity.ai".to_string(),
            model: "sonar".to_string(),
            recency_filter: "month".to_string(),
        }
    }
}

impl FilePerplexityConfig {
    /// Search is enabled only when a key resolves
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_ref(), &self.api_key_env)
    }
}

/// Tavily search API, the first fallback after Perplexity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTavilyConfig {
    /// Environment variable name for the API key (default: "TAVILY_API_KEY").
    pub api_key_env: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_results: usize,
}

impl Default for FileTavilyConfig {
    fn default() -> Self {
        Self {
            api_key_env: "TAVILY_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.tavily.com".to_string(),
            max_results: 5,
        }
    }
}

impl FileTavilyConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_ref(), &self.api_key_env)
    }
}

/// Serper (Google results) search API, the last fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSerperConfig {
    /// Environment variable name for the API key (default: "SERPER_API_KEY").
    pub api_key_env: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_results: usize,
}

impl Default for FileSerperConfig {
    fn default() -> Self {
        Self {
            api_key_env: "SERPER_API_KEY".to_string(),
            api_key: None,
            base_url: "https://google.serper.dev".to_string(),
            max_results: 5,
        }
    }
}

impl FileSerperConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_ref(), &self.api_key_env)
    }
}

/// Search providers are tried in the order perplexity, tavily, serper
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProvidersConfig {
    pub openai: FileOpenAiConfig,
    pub perplexity: FilePerplexityConfig,
    pub tavily: FileTavilyConfig,
    pub serper: FileSerperConfig,
}
