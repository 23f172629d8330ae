//! Ordered chain of search providers.
//!
//! Providers are tried in order; the first success wins and each failure
//! hands the query to the next one.

use async_trait::async_trait;
use ensemble_application::{SearchError, SearchResult, WebSearch};
use std::sync::Arc;
use tracing::{info, warn};

pub struct FallbackSearch {
    providers: Vec<(&'static str, Arc<dyn WebSearch>)>,
}

impl FallbackSearch {
    pub fn new(providers: Vec<(&'static str, Arc<dyn WebSearch>)>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|(name, _)| *name).collect()
    }
}

#[async_trait]
impl WebSearch for FallbackSearch {
    async fn search(&self, query: &str) -> Result<SearchResult, SearchError> {
        let mut last_error = SearchError::Request("no search provider configured".to_string());
        for (i, (name, provider)) in self.providers.iter().enumerate() {
            match provider.search(query).await {
                Ok(result) => {
                    if i > 0 {
                        info!("Fallback search served by {}", name);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    warn!("{} search failed: {}", name, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        calls: AtomicUsize,
        outcome: Result<SearchResult, SearchError>,
    }

    impl Fixed {
        fn ok(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome: Ok(SearchResult {
                    answer: answer.to_string(),
                    citations: Vec::new(),
                    cost: 0.001,
                }),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome: Err(SearchError::Upstream {
                    status,
                    message: "down".into(),
                }),
            })
        }
    }

    #[async_trait]
    impl WebSearch for Fixed {
        async fn search(&self, _query: &str) -> Result<SearchResult, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let primary = Fixed::failing(500);
        let second = Fixed::ok("from tavily");
        let third = Fixed::ok("from serper");
        let chain = FallbackSearch::new(vec![
            ("perplexity", primary.clone() as Arc<dyn WebSearch>),
            ("tavily", second.clone() as Arc<dyn WebSearch>),
            ("serper", third.clone() as Arc<dyn WebSearch>),
        ]);

        let result = chain.search("rates").await.unwrap();
        assert_eq!(result.answer, "from tavily");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_last_error_surfaces() {
        let chain = FallbackSearch::new(vec![
            ("tavily", Fixed::failing(500) as Arc<dyn WebSearch>),
            ("serper", Fixed::failing(403) as Arc<dyn WebSearch>),
        ]);
        assert!(matches!(
            chain.search("rates").await,
            Err(SearchError::Upstream { status: 403, .. })
        ));
        assert!(FallbackSearch::new(Vec::new()).search("rates").await.is_err());
    }
}
