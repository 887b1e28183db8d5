//! Context search providers
//!
//! [`TavilySearch`] covers the web, [`WikipediaSearch`] covers the
//! encyclopedia, and [`CombinedSearch`] fans a query out to several
//! providers at once.

mod tavily;
mod wikipedia;

pub use tavily::{TavilyError, TavilySearch};
pub use wikipedia::WikipediaSearch;

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ResearchError, Result};
use crate::ports::{ContextSearch, Document};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("{provider} search failed: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("All {0} search providers failed")]
    AllFailed(usize),
}

impl From<SearchError> for ResearchError {
    fn from(e: SearchError) -> Self {
        ResearchError::Search(e.to_string())
    }
}

/// Queries every provider concurrently and concatenates the results in
/// registration order. A failing provider is logged and skipped.
#[derive(Clone, Default)]
pub struct CombinedSearch {
    providers: Vec<(String, Arc<dyn ContextSearch>)>,
}

impl CombinedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, name: impl Into<String>, provider: Arc<dyn ContextSearch>) -> Self {
        self.providers.push((name.into(), provider));
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl ContextSearch for CombinedSearch {
    async fn search(&self, query: &str) -> Result<Vec<Document>> {
        let results = join_all(self.providers.iter().map(|(_, p)| p.search(query))).await;

        let mut documents = Vec::new();
        let mut failures = 0;
        for ((name, _), result) in self.providers.iter().zip(results) {
            match result {
                Ok(docs) => {
                    debug!(provider = %name, count = docs.len(), "Search provider returned");
                    documents.extend(docs);
                }
                Err(e) => {
                    warn!(provider = %name, query, error = %e, "Search provider failed");
                    failures += 1;
                }
            }
        }

        if failures > 0 && failures == self.providers.len() {
            return Err(SearchError::AllFailed(failures).into());
        }
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::NoSearch;

    struct Fixed(Vec<Document>);

    #[async_trait]
    impl ContextSearch for Fixed {
        async fn search(&self, _query: &str) -> Result<Vec<Document>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl ContextSearch for Failing {
        async fn search(&self, _query: &str) -> Result<Vec<Document>> {
            Err(SearchError::Provider {
                provider: "failing",
                message: "down".to_string(),
            }
            .into())
        }
    }

    fn doc(url: &str) -> Document {
        Document::new(url, url, "content", "web")
    }

    #[tokio::test]
    async fn test_results_keep_provider_order() {
        let search = CombinedSearch::new()
            .with_provider("web", Arc::new(Fixed(vec![doc("a"), doc("b")])))
            .with_provider("wiki", Arc::new(Fixed(vec![doc("c")])));

        let urls: Vec<_> = search
            .search("q")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.url)
            .collect();
        assert_eq!(urls, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failed_provider_is_skipped() {
        let search = CombinedSearch::new()
            .with_provider("broken", Arc::new(Failing))
            .with_provider("wiki", Arc::new(Fixed(vec![doc("c")])));

        assert_eq!(search.search("q").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_all_failed_is_an_error() {
        let search = CombinedSearch::new()
            .with_provider("a", Arc::new(Failing))
            .with_provider("b", Arc::new(Failing));

        let err = search.search("q").await.unwrap_err();
        assert!(matches!(err, ResearchError::Search(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_empty_combination() {
        let search = CombinedSearch::new();
        assert!(search.is_empty());
        assert!(search.search("q").await.unwrap().is_empty());

        let search = search.with_provider("none", Arc::new(NoSearch));
        assert_eq!(search.len(), 1);
        assert!(search.search("q").await.unwrap().is_empty());
    }
}
