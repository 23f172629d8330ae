//! Perplexity search-augmented answers.
//!
//! One chat completion against a search-enabled model returns an answer
//! grounded in recent web results plus the URLs it cited.

use crate::config::FilePerplexityConfig;
use crate::openai::error::ProviderError;
use crate::openai::protocol::{ChatResponse, Message, Role};
use async_trait::async_trait;
use ensemble_application::{SearchError, SearchResult, WebSearch};
use ensemble_domain::cost::pricing::ModelPricing;
use ensemble_domain::TokenUsage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// USD per 1K tokens for the search model
const SEARCH_PRICING: ModelPricing = ModelPricing::new(0.007, 0.028);
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const SEARCH_MAX_TOKENS: u32 = 2048;
const SYSTEM_PROMPT: &str = "You are a helpful assistant that provides accurate, up-to-date \
information based on web search results. Always cite your sources.";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    search_recency_filter: &'a str,
    return_citations: bool,
}

/// Citations arrive as bare URLs or as objects with a `url`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Citation {
    Url(String),
    Detailed { url: String },
}

impl Citation {
    fn into_url(self) -> String {
        match self {
            Citation::Url(url) | Citation::Detailed { url } => url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(flatten)]
    chat: ChatResponse,
    #[serde(default)]
    citations: Vec<Citation>,
}

pub struct PerplexitySearch {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    recency_filter: String,
}

impl PerplexitySearch {
    pub fn from_config(config: &FilePerplexityConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| ProviderError::MissingApiKey {
                env: config.api_key_env.clone(),
            })?;
        let client = Client::builder().timeout(SEARCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            recency_filter: config.recency_filter.clone(),
        })
    }

    fn request<'a>(&'a self, query: &str) -> SearchRequest<'a> {
        SearchRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: Role::System,
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: Role::User,
                    content: query.to_string(),
                },
            ],
            max_tokens: SEARCH_MAX_TOKENS,
            temperature: 0.7,
            search_recency_filter: &self.recency_filter,
            return_citations: true,
        }
    }
}

fn parse_search(body: &str) -> Result<SearchResult, SearchError> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Request(format!("malformed search response: {e}")))?;
    let answer = response
        .chat
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    let usage = response.chat.usage.unwrap_or_default();
    let cost = SEARCH_PRICING.cost(TokenUsage::new(usage.prompt_tokens, usage.completion_tokens));

    Ok(SearchResult {
        answer,
        citations: response.citations.into_iter().map(Citation::into_url).collect(),
        cost,
    })
}

#[async_trait]
impl WebSearch for PerplexitySearch {
    async fn search(&self, query: &str) -> Result<SearchResult, SearchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(query))
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;
        if !status.is_success() {
            warn!("Perplexity search failed with {}", status);
            return Err(SearchError::Upstream {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let result = parse_search(&body)?;
        info!(
            "Perplexity search completed: {} citations, ${:.6}",
            result.citations.len(),
            result.cost
        );
        Ok(result)
    }
}
