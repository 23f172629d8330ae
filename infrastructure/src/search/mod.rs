//! Web search adapters implementing the
//! [`WebSearch`](ensemble_application::WebSearch) port.
//!
//! Perplexity answers with citations; Tavily and Serper return ranked links
//! and only serve as fallbacks when Perplexity is missing or failing.

mod fallback;
mod hits;
mod perplexity;
mod serper;
mod tavily;

pub use fallback::FallbackSearch;
pub use perplexity::PerplexitySearch;
pub use serper::SerperSearch;
pub use tavily::TavilySearch;

use crate::config::FileProvidersConfig;
use crate::openai::error::ProviderError;
use ensemble_application::WebSearch;
use std::sync::Arc;
use tracing::info;

fn enabled<S: WebSearch + 'static>(
    name: &'static str,
    built: Result<S, ProviderError>,
) -> Option<(&'static str, Arc<dyn WebSearch>)> {
    match built {
        Ok(search) => Some((name, Arc::new(search) as Arc<dyn WebSearch>)),
        Err(e) => {
            info!("{} search disabled: {}", name, e);
            None
        }
    }
}

/// Every provider with a resolvable key, in fallback order; `None` when none has one
pub fn build_web_search(providers: &FileProvidersConfig) -> Option<Arc<dyn WebSearch>> {
    let chain: Vec<(&'static str, Arc<dyn WebSearch>)> = [
        enabled("perplexity", PerplexitySearch::from_config(&providers.perplexity)),
        enabled("tavily", TavilySearch::from_config(&providers.tavily)),
        enabled("serper", SerperSearch::from_config(&providers.serper)),
    ]
    .into_iter()
    .flatten()
    .collect();

    match chain.len() {
        0 => None,
        1 => chain.into_iter().next().map(|(_, search)| search),
        _ => {
            let fallback = FallbackSearch::new(chain);
            info!("Web search chain: {}", fallback.provider_names().join(" -> "));
            Some(Arc::new(fallback))
        }
    }
}
