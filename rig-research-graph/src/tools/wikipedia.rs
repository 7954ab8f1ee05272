//! Wikipedia encyclopedia lookup
//!
//! Uses the MediaWiki `action=query` API with a search generator and
//! plain-text extracts, so one request returns both hits and content.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::search::{EncyclopediaDocument, EncyclopediaSearch};
use crate::error::RetrievalError;

const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Article text beyond this many characters is cut off
const DEFAULT_MAX_CHARS: usize = 4000;

/// MediaWiki-backed `EncyclopediaSearch`
pub struct WikipediaSearch {
    client: Client,
    base_url: String,
    timeout: Duration,
    max_chars: usize,
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
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    /// Another wiki or language edition, e.g. `https://de.wikipedia.org`
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

#[async_trait]
impl EncyclopediaSearch for WikipediaSearch {
    async fn search(
        &self,
        query: &str,
        max_docs: usize,
    ) -> Result<Vec<EncyclopediaDocument>, RetrievalError> {
        debug!(query, max_docs, "Executing Wikipedia search");

        let limit = max_docs.to_string();
        let response = self
            .client
            .get(format!("{}/w/api.php", self.base_url))
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("generator", "search"),
                ("gsrsearch", query),
                ("gsrlimit", limit.as_str()),
                ("prop", "extracts|info"),
                ("inprop", "url"),
                ("explaintext", "1"),
                ("exintro", "0"),
                ("exlimit", "max"),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(RetrievalError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::from_status(status.as_u16(), body));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::ParseError(e.to_string()))?;

        let mut pages = body.query.map(|q| q.pages).unwrap_or_default();
        pages.sort_by_key(|p| p.index);

        Ok(pages
            .into_iter()
            .take(max_docs)
            .map(|page| {
                let content = truncate_chars(page.extract.as_deref().unwrap_or_default(), self.max_chars);
                EncyclopediaDocument::new(page.fullurl, content).with_page(page.title)
            })
            .collect())
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Absent `query` means the search had no hits
#[derive(Debug, Deserialize)]
struct QueryResponse {
    query: Option<QueryPages>,
}

#[derive(Debug, Deserialize)]
struct QueryPages {
    #[serde(default)]
    pages: Vec<WikiPage>,
}

#[derive(Debug, Deserialize)]
struct WikiPage {
    title: String,
    #[serde(default)]
    index: u32,
    #[serde(default)]
    fullurl: String,
    extract: Option<String>,
}
