//! Ranked result lists from the plain search APIs.
//!
//! Tavily and Serper return links with snippets rather than a written
//! answer, so the hits are rendered into one numbered source block.

use ensemble_application::{SearchError, SearchResult};
use ensemble_domain::core::string::truncate_chars;
use reqwest::Url;

/// Flat fee per plain search call, in USD
pub const FALLBACK_SEARCH_COST: f64 = 0.001;

const SNIPPET_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub published: Option<String>,
}

/// Host without a leading `www.`, or the raw string when it does not parse
fn source_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| url.to_string())
}

/// An empty hit list is an error so the next provider gets a turn
pub fn into_result(provider: &str, hits: Vec<SearchHit>) -> Result<SearchResult, SearchError> {
    if hits.is_empty() {
        return Err(SearchError::Request(format!("{provider} returned no results")));
    }

    let mut answer = String::from("Current information from web search:");
    for (i, hit) in hits.iter().enumerate() {
        let date = hit
            .published
            .as_deref()
            .map(|d| format!(" ({d})"))
            .unwrap_or_default();
        answer.push_str(&format!(
            "\n\nSource {}: {}{}\nTitle: {}\nContent: {}",
            i + 1,
            source_of(&hit.url),
            date,
            hit.title,
            truncate_chars(&hit.snippet, SNIPPET_CHARS)
        ));
    }

    Ok(SearchResult {
        answer,
        citations: hits.into_iter().map(|h| h.url).collect(),
        cost: FALLBACK_SEARCH_COST,
    })
}
