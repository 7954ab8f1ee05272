//! Retrieval collaborator traits and document formatting

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// Separator between formatted documents in one context entry
pub const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

/// A web search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebDocument {
    pub url: String,
    pub content: String,
}

impl WebDocument {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
        }
    }

    pub fn to_block(&self) -> String {
        format!("<Document href=\"{}\"/>\n{}\n</Document>", self.url, self.content)
    }
}

/// An encyclopedia article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncyclopediaDocument {
    pub source: String,
    pub page: Option<String>,
    pub content: String,
}

impl EncyclopediaDocument {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page: None,
            content: content.into(),
        }
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    /// A missing page renders as an empty attribute.
    pub fn to_block(&self) -> String {
        format!(
            "<Document source=\"{}\" page=\"{}\"/>\n{}\n</Document>",
            self.source,
            self.page.as_deref().unwrap_or_default(),
            self.content
        )
    }
}

/// Web search provider
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<WebDocument>, RetrievalError>;
}

/// Encyclopedia lookup provider
#[async_trait]
pub trait EncyclopediaSearch: Send + Sync {
    async fn search(&self, query: &str, max_docs: usize)
        -> Result<Vec<EncyclopediaDocument>, RetrievalError>;
}

/// Format web hits as one context entry; no hits gives an empty string.
pub fn format_web_documents(docs: &[WebDocument]) -> String {
    docs.iter()
        .map(WebDocument::to_block)
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

pub fn format_encyclopedia_documents(docs: &[EncyclopediaDocument]) -> String {
    docs.iter()
        .map(EncyclopediaDocument::to_block)
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}
