//! Tavily search API.

use super::hits::{SearchHit, into_result};
use crate::config::FileTavilyConfig;
use crate::openai::error::ProviderError;
use async_trait::async_trait;
use ensemble_application::{SearchError, SearchResult, WebSearch};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    include_answer: bool,
    include_raw_content: bool,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    published_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyItem>,
}

pub struct TavilySearch {
    client: Client,
    api_key: String,
    endpoint: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn from_config(config: &FileTavilyConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| ProviderError::MissingApiKey {
                env: config.api_key_env.clone(),
            })?;
        Ok(Self {
            client: Client::builder().timeout(SEARCH_TIMEOUT).build()?,
            api_key,
            endpoint: format!("{}/search", config.base_url.trim_end_matches('/')),
            max_results: config.max_results,
        })
    }

    fn request<'a>(&'a self, query: &'a str) -> TavilyRequest<'a> {
        TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: "advanced",
            include_answer: false,
            include_raw_content: false,
            max_results: self.max_results,
        }
    }
}

fn parse_tavily(body: &str) -> Result<SearchResult, SearchError> {
    let response: TavilyResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Request(format!("malformed Tavily response: {e}")))?;
    let hits = response
        .results
        .into_iter()
        .map(|item| SearchHit {
            title: item.title,
            url: item.url,
            snippet: item.content,
            published: item.published_date,
        })
        .collect();
    into_result("tavily", hits)
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<SearchResult, SearchError> {
        let response = self
            .client
            .post(&self.endpoint)
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
            warn!("Tavily search failed with {}", status);
            return Err(SearchError::Upstream {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let result = parse_tavily(&body)?;
        info!("Tavily search returned {} results", result.citations.len());
        Ok(result)
    }
}
