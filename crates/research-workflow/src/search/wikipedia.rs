//! Wikipedia search through the MediaWiki query API

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::SearchError;
use crate::error::Result;
use crate::ports::{ContextSearch, Document};

const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";
const ARTICLE_BASE_URL: &str = "https://en.wikipedia.org/wiki/";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_MAX_DOCS: u32 = 2;

pub struct WikipediaSearch {
    client: Client,
    api_url: String,
    timeout: Duration,
    max_docs: u32,
}

impl Default for WikipediaSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl WikipediaSearch {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_docs: DEFAULT_MAX_DOCS,
        }
    }

    /// Full URL of the `api.php` endpoint
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_docs(mut self, max_docs: u32) -> Self {
        self.max_docs = max_docs.max(1);
        self
    }

    async fn query(&self, query: &str) -> std::result::Result<QueryResponse, SearchError> {
        let limit = self.max_docs.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("generator", "search"),
                ("gsrsearch", query),
                ("gsrlimit", limit.as_str()),
                ("prop", "extracts|info"),
                ("inprop", "url"),
                ("explaintext", "1"),
                ("exintro", "1"),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| provider_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(provider_error(format!("HTTP {}", status.as_u16())));
        }

        response
            .json()
            .await
            .map_err(|e| provider_error(format!("Failed to parse response: {}", e)))
    }
}

fn provider_error(message: String) -> SearchError {
    SearchError::Provider {
        provider: "wikipedia",
        message,
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    /// Absent when the search matched nothing
    query: Option<QueryPages>,
}

#[derive(Debug, Deserialize)]
struct QueryPages {
    #[serde(default)]
    pages: HashMap<String, WikiPage>,
}

#[derive(Debug, Deserialize)]
struct WikiPage {
    title: String,
    #[serde(default)]
    extract: String,
    fullurl: Option<String>,
    /// Search rank
    #[serde(default)]
    index: u32,
}

impl From<WikiPage> for Document {
    fn from(page: WikiPage) -> Self {
        let url = page.fullurl.unwrap_or_else(|| {
            format!(
                "{}{}",
                ARTICLE_BASE_URL,
                urlencoding::encode(&page.title.replace(' ', "_"))
            )
        });
        Document::new(url, page.title.clone(), page.extract, "wikipedia").with_page(page.title)
    }
}

#[async_trait]
impl ContextSearch for WikipediaSearch {
    async fn search(&self, query: &str) -> Result<Vec<Document>> {
        let response = self.query(query).await?;

        let mut pages: Vec<WikiPage> = response
            .query
            .map(|q| q.pages.into_values().collect())
            .unwrap_or_default();
        pages.sort_by_key(|p| p.index);

        debug!(query, results = pages.len(), "Wikipedia search complete");
        Ok(pages.into_iter().map(Document::from).collect())
    }
}
