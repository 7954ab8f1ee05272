//! Tavily web search
//!
//! `POST {base}/search` with a bearer key. Transient failures (429, 5xx,
//! transport) are retried under the engine's `RetryPolicy`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::search::{WebDocument, WebSearch};
use crate::error::RetrievalError;
use crate::pregel::RetryPolicy;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    /// Slower, costs two API credits per query
    Advanced,
}

/// Tavily-backed `WebSearch`
///
/// ```ignore
/// let search = TavilySearch::from_env()?;
/// let docs = search.search("Pregel graph processing", 3).await?;
/// ```
pub struct TavilySearch {
    api_key: String,
    client: Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    search_depth: SearchDepth,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::new(3).with_backoff_base(Duration::from_secs(1)),
            search_depth: SearchDepth::default(),
        }
    }

    /// Reads `TAVILY_API_KEY`.
    pub fn from_env() -> Result<Self, RetrievalError> {
        let api_key = std::env::var("TAVILY_API_KEY").map_err(|_| {
            RetrievalError::Config("TAVILY_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    /// Point at another endpoint (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_search_depth(mut self, depth: SearchDepth) -> Self {
        self.search_depth = depth;
        self
    }

    async fn post_with_retry(
        &self,
        request: &TavilyRequest<'_>,
    ) -> Result<TavilyResponse, RetrievalError> {
        let mut retries = 0;
        loop {
            match self.post(request).await {
                Err(e) if e.is_retryable() && self.retry.should_retry(retries) => {
                    let delay = self.retry.delay_for_attempt(retries);
                    retries += 1;
                    warn!(retries, ?delay, error = %e, "tavily search failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                outcome => return outcome,
            }
        }
    }

    async fn post(
        &self,
        request: &TavilyRequest<'_>,
    ) -> Result<TavilyResponse, RetrievalError> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(RetrievalError::from_transport)?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| RetrievalError::ParseError(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(RetrievalError::from_status(status.as_u16(), body))
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<WebDocument>, RetrievalError> {
        debug!(query, max_results, "tavily search");

        let request = TavilyRequest {
            query,
            max_results,
            search_depth: self.search_depth,
        };
        let TavilyResponse { results } = self.post_with_retry(&request).await?;

        Ok(results
            .into_iter()
            .take(max_results)
            .map(|hit| WebDocument::new(hit.url, hit.content))
            .collect())
    }
}

impl std::fmt::Debug for TavilySearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilySearch")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: SearchDepth,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = TavilyRequest {
            query: "pregel",
            max_results: 3,
            search_depth: SearchDepth::Advanced,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"query": "pregel", "max_results": 3, "search_depth": "advanced"})
        );
    }

    #[test]
    fn test_debug_hides_api_key() {
        let search = TavilySearch::new("test-key")
            .with_base_url("http://localhost:9999/")
            .with_timeout(Duration::from_secs(60))
            .with_retry(RetryPolicy::new(5));

        assert_eq!(search.base_url, "http://localhost:9999");
        assert_eq!(search.timeout, Duration::from_secs(60));
        assert_eq!(search.retry.max_retries, 5);
        assert!(!format!("{search:?}").contains("test-key"));
    }

    #[test]
    fn test_response_tolerates_missing_content() {
        let parsed: TavilyResponse =
            serde_json::from_str(r#"{"results": [{"url": "https://a", "title": "A"}]}"#).unwrap();
        assert_eq!(parsed.results[0].content, "");
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn search_for(server: &MockServer) -> TavilySearch {
        TavilySearch::new("test-key")
            .with_base_url(server.uri())
            .with_timeout(Duration::from_secs(5))
            .with_retry(RetryPolicy::no_retry())
    }

    #[tokio::test]
    async fn test_successful_search() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"query": "pregel", "max_results": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"title": "A", "url": "https://a.example", "content": "alpha", "score": 0.9},
                    {"title": "B", "url": "https://b.example", "content": "beta", "score": 0.8}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let docs = search_for(&server).search("pregel", 3).await.unwrap();
        assert_eq!(
            docs,
            vec![
                WebDocument::new("https://a.example", "alpha"),
                WebDocument::new("https://b.example", "beta"),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        let docs = search_for(&server).search("nothing", 3).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let err = search_for(&server)
            .with_retry(RetryPolicy::new(3).with_backoff_base(Duration::from_millis(1)))
            .search("q", 3)
            .await
            .unwrap_err();
        assert_eq!(err, RetrievalError::Unauthorized);
    }

    #[tokio::test]
    async fn test_server_error_retried_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .expect(3)
            .mount(&server)
            .await;

        let err = search_for(&server)
            .with_retry(RetryPolicy::new(2).with_backoff_base(Duration::from_millis(1)))
            .search("q", 3)
            .await
            .unwrap_err();
        assert_eq!(err, RetrievalError::ServerError(503, "down".into()));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = search_for(&server).search("q", 3).await.unwrap_err();
        assert!(matches!(err, RetrievalError::ParseError(_)));
    }
}
