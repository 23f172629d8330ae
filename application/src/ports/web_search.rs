//! Web search port
//!
//! Optional grounding for questions that need data newer than the models'
//! training cut-off.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    Request(String),

    #[error("Search provider returned {status}: {message}")]
    Upstream { status: u16, message: String },
}

/// Answer and sources from one search call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub answer: String,
    pub citations: Vec<String>,
    pub cost: f64,
}

impl SearchResult {
    /// Text block appended to the ensemble prompt
    pub fn as_context(&self) -> String {
        let mut context = self.answer.clone();
        if !self.citations.is_empty() {
            context.push_str("\n\nSources:");
            for (i, url) in self.citations.iter().enumerate() {
                context.push_str(&format!("\n[{}] {}", i + 1, url));
            }
        }
        context
    }
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResult, SearchError>;
}
