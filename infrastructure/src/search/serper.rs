//! Serper (Google results) search API.

use super::hits::{SearchHit, into_result};
use crate::config::FileSerperConfig;
use crate::openai::error::ProviderError;
use async_trait::async_trait;
use ensemble_application::{SearchError, SearchResult, WebSearch};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

pub struct SerperSearch {
    client: Client,
    api_key: String,
    endpoint: String,
    max_results: usize,
}

impl SerperSearch {
    pub fn from_config(config: &FileSerperConfig) -> Result<Self, ProviderError> {
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
}

fn parse_serper(body: &str) -> Result<SearchResult, SearchError> {
    let response: SerperResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Request(format!("malformed Serper response: {e}")))?;
    let hits = response
        .organic
        .into_iter()
        .map(|item| SearchHit {
            title: item.title,
            url: item.link,
            snippet: item.snippet,
            published: item.date,
        })
        .collect();
    into_result("serper", hits)
}

#[async_trait]
impl WebSearch for SerperSearch {
    async fn search(&self, query: &str) -> Result<SearchResult, SearchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&SerperRequest {
                q: query,
                num: self.max_results,
            })
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;
        if !status.is_success() {
            warn!("Serper search failed with {}", status);
            return Err(SearchError::Upstream {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let result = parse_serper(&body)?;
        info!("Serper search returned {} results", result.citations.len());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_organic_results() {
        let body = r#"{
            "searchParameters": {"q": "rates"},
            "organic": [{"title": "Fed holds", "link": "https://www.fed.example/a", "snippet": "Held steady.", "date": "Mar 3, 2026", "position": 1}]
        }"#;
        let result = parse_serper(body).unwrap();
        assert_eq!(result.citations, vec!["https://www.fed.example/a"]);
        assert!(result.answer.contains("Source 1: fed.example (Mar 3, 2026)\nTitle: Fed holds"));
    }

    #[test]
    fn test_missing_key() {
        let config = FileSerperConfig {
            api_key_env: "ENSEMBLE_TEST_UNSET_KEY_VAR".into(),
            ..FileSerperConfig::default()
        };
        assert!(matches!(
            SerperSearch::from_config(&config),
            Err(ProviderError::MissingApiKey { .. })
        ));
        assert!(parse_serper(r#"{"organic": []}"#).is_err());
    }
}
