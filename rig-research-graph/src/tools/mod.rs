//! Retrieval collaborators
//!
//! - [`WebSearch`] / [`TavilySearch`]: web search hits (`url`, `content`)
//! - [`EncyclopediaSearch`] / [`WikipediaSearch`]: encyclopedia articles

mod search;
mod tavily;
mod wikipedia;

pub use search::{
    format_encyclopedia_documents, format_web_documents, EncyclopediaDocument,
    EncyclopediaSearch, WebDocument, WebSearch, DOCUMENT_SEPARATOR,
};
pub use tavily::{SearchDepth, TavilySearch};
pub use wikipedia::WikipediaSearch;
