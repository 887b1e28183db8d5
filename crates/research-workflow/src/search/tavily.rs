//! Tavily web search
//!
//! HTTP timeout, retry with exponential backoff on transient failures and
//! typed errors for rate limits and timeouts.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::SearchError;
use crate::error::{ResearchError, Result};
use crate::ports::{ContextSearch, Document};

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// Default timeout for Tavily API requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum retry attempts for transient failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff
const RETRY_BASE_DELAY_MS: u64 = 1000;

pub const DEFAULT_MAX_RESULTS: u32 = 3;

pub struct TavilySearch {
    api_key: String,
    client: Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    max_results: u32,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Create from the TAVILY_API_KEY environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| ResearchError::config("TAVILY_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    /// Point at another host, e.g. a mock server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.clamp(1, 20);
        self
    }

    async fn execute_with_retry(&self, request: &TavilyRequest) -> Result<TavilyResponse, TavilyError> {
        let mut last_error = TavilyError::Unknown("No attempts made".to_string());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.retry_base_delay * 2u32.pow(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis(), "Retrying Tavily request");
                tokio::time::sleep(delay).await;
            }

            match self.execute_single_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    warn!(attempt, error = %e, "Tavily request failed, will retry");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn execute_single_request(&self, request: &TavilyRequest) -> Result<TavilyResponse, TavilyError> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TavilyError::Timeout
                } else if e.is_connect() {
                    TavilyError::Connection(e.to_string())
                } else {
                    TavilyError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| TavilyError::ParseError(e.to_string()));
        }

        let error_text = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => Err(TavilyError::Unauthorized),
            429 => Err(TavilyError::RateLimited),
            400 => Err(TavilyError::BadRequest(error_text)),
            500..=599 => Err(TavilyError::ServerError(status.as_u16(), error_text)),
            _ => Err(TavilyError::HttpError(status.as_u16(), error_text)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TavilyError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - check API key")]
    Unauthorized,

    #[error("Rate limited - too many requests")]
    RateLimited,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("HTTP error ({0}): {1}")]
    HttpError(u16, String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl TavilyError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TavilyError::Timeout
                | TavilyError::Connection(_)
                | TavilyError::RateLimited
                | TavilyError::ServerError(_, _)
        )
    }
}

impl From<TavilyError> for SearchError {
    fn from(e: TavilyError) -> Self {
        SearchError::Provider {
            provider: "tavily",
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest {
    query: String,
    max_results: u32,
    search_depth: &'static str,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl From<TavilyResult> for Document {
    fn from(result: TavilyResult) -> Self {
        Document::new(result.url, result.title, result.content, "web")
    }
}

#[async_trait]
impl ContextSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<Document>> {
        let request = TavilyRequest {
            query: query.to_string(),
            max_results: self.max_results,
            search_depth: "basic",
            include_answer: false,
            include_raw_content: false,
        };

        let response = self
            .execute_with_retry(&request)
            .await
            .map_err(SearchError::from)?;

        debug!(query, results = response.results.len(), "Tavily search complete");
        Ok(response.results.into_iter().map(Document::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(TavilyError::Timeout.is_retryable());
        assert!(TavilyError::Connection("refused".into()).is_retryable());
        assert!(TavilyError::RateLimited.is_retryable());
        assert!(TavilyError::ServerError(503, "".into()).is_retryable());

        assert!(!TavilyError::Unauthorized.is_retryable());
        assert!(!TavilyError::BadRequest("".into()).is_retryable());
        assert!(!TavilyError::ParseError("".into()).is_retryable());
    }

    #[test]
    fn test_max_results_clamped() {
        assert_eq!(TavilySearch::new("k").with_max_results(0).max_results, 1);
        assert_eq!(TavilySearch::new("k").with_max_results(50).max_results, 20);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let search = TavilySearch::new("k").with_base_url("http://localhost:1234/");
        assert_eq!(search.base_url, "http://localhost:1234");
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn search_for(server: &MockServer) -> TavilySearch {
        TavilySearch::new("test-key")
            .with_base_url(server.uri())
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(0)
    }

    fn sample_success_response() -> serde_json::Value {
        serde_json::json!({
            "answer": null,
            "results": [
                {
                    "title": "Rust Programming Language",
                    "url": "https://rust-lang.org",
                    "content": "Rust is a systems programming language focused on safety.",
                    "score": 0.95,
                    "raw_content": null
                },
                {
                    "title": "Learn Rust",
                    "url": "https://doc.rust-lang.org/book/",
                    "content": "The Rust Programming Language book.",
                    "score": 0.88,
                    "raw_content": null
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_http_successful_search() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"query": "rust", "max_results": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_success_response()))
            .expect(1)
            .mount(&server)
            .await;

        let docs = search_for(&server).search("rust").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].url, "https://rust-lang.org");
        assert_eq!(docs[0].source_type, "web");
        assert_eq!(docs[1].title, "Learn Rust");
    }

    #[tokio::test]
    async fn test_http_unauthorized_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = search_for(&server)
            .with_max_retries(3)
            .with_retry_base_delay(Duration::from_millis(10))
            .search("rust")
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::Search(_)));
        assert!(err.to_string().contains("Unauthorized"));
    }

    #[tokio::test]
    async fn test_http_server_error_retries_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_success_response()))
            .mount(&server)
            .await;

        let docs = search_for(&server)
            .with_max_retries(2)
            .with_retry_base_delay(Duration::from_millis(10))
            .search("rust")
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_http_rate_limit_exhausts_retries() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let err = search_for(&server)
            .with_max_retries(1)
            .with_retry_base_delay(Duration::from_millis(10))
            .search("rust")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Rate limited"));
    }

    #[tokio::test]
    async fn test_http_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = search_for(&server).search("rust").await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse response"));
    }
}
