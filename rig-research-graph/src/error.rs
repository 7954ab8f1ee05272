// src/error.rs
//! Error types for collaborators and research nodes
//!
//! The workflow engine has its own `PregelError`. The types here describe what
//! can go wrong inside a node: a model call, a retrieval call, a missing state
//! key, or a malformed report body. Nodes never propagate these; they are
//! folded into the state through the error envelope (see `envelope`).

use thiserror::Error;

/// Failure of the model-invocation collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Model call timed out: {0}")]
    Timeout(String),

    #[error("Model provider rate limited the request: {0}")]
    RateLimited(String),

    /// The model answered, but the answer did not match the requested shape
    #[error("Model output failed validation: {0}")]
    Validation(String),

    #[error("Model provider error: {0}")]
    Provider(String),

    #[error("Model configuration error: {0}")]
    Config(String),
}

impl ModelError {
    /// Transient failures are worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelError::Timeout(_) | ModelError::RateLimited(_))
    }

    /// Classify a provider error message into a `ModelError`.
    ///
    /// Rig surfaces HTTP and provider failures as strings, so rate limits and
    /// timeouts are recognised by their text.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
            ModelError::RateLimited(message)
        } else if lower.contains("timed out") || lower.contains("timeout") {
            ModelError::Timeout(message)
        } else {
            ModelError::Provider(message)
        }
    }
}

/// Failure of a retrieval collaborator (web search or encyclopedia lookup)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
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

    #[error("Retriever configuration error: {0}")]
    Config(String),
}

impl RetrievalError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RetrievalError::Timeout
                | RetrievalError::Connection(_)
                | RetrievalError::RateLimited
                | RetrievalError::ServerError(_, _)
        )
    }

    /// Map a reqwest transport error
    pub fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RetrievalError::Timeout
        } else if e.is_connect() {
            RetrievalError::Connection(e.to_string())
        } else {
            RetrievalError::Network(e.to_string())
        }
    }

    /// Map a non-success HTTP status
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => RetrievalError::Unauthorized,
            429 => RetrievalError::RateLimited,
            400 => RetrievalError::BadRequest(body),
            500..=599 => RetrievalError::ServerError(status, body),
            _ => RetrievalError::HttpError(status, body),
        }
    }
}

/// Node-level failure taxonomy recorded through the error envelope
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Model invocation failed: {0}")]
    ModelInvocation(#[from] ModelError),

    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Required state key missing: {key}")]
    StateShape { key: String },

    #[error("Report assembly failed: {0}")]
    ReportAssembly(String),
}

impl ResearchError {
    /// Stable type name stored in `ErrorInfo::error_type`
    pub fn kind(&self) -> &'static str {
        match self {
            ResearchError::ModelInvocation(_) => "ModelInvocationError",
            ResearchError::Retrieval(_) => "RetrievalError",
            ResearchError::StateShape { .. } => "StateShapeError",
            ResearchError::ReportAssembly(_) => "ReportAssemblyError",
        }
    }

    pub fn state_shape(key: impl Into<String>) -> Self {
        ResearchError::StateShape { key: key.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_model_error_transient() {
        assert!(ModelError::Timeout("30s".into()).is_transient());
        assert!(ModelError::RateLimited("slow down".into()).is_transient());
        assert!(!ModelError::Validation("bad json".into()).is_transient());
        assert!(!ModelError::Provider("boom".into()).is_transient());
    }

    #[test]
    fn test_model_error_classify() {
        assert!(matches!(
            ModelError::classify("HTTP 429 Too Many Requests"),
            ModelError::RateLimited(_)
        ));
        assert!(matches!(
            ModelError::classify("operation timed out"),
            ModelError::Timeout(_)
        ));
        assert!(matches!(
            ModelError::classify("invalid model name"),
            ModelError::Provider(_)
        ));
    }

    #[test]
    fn test_retrieval_status_mapping() {
        assert_eq!(RetrievalError::from_status(401, String::new()), RetrievalError::Unauthorized);
        assert_eq!(RetrievalError::from_status(429, String::new()), RetrievalError::RateLimited);
        assert!(RetrievalError::from_status(503, "down".into()).is_retryable());
        assert!(!RetrievalError::from_status(404, "missing".into()).is_retryable());
    }

    #[test]
    fn test_research_error_kind_and_source() {
        let err = ResearchError::from(ModelError::Timeout("60s".into()));
        assert_eq!(err.kind(), "ModelInvocationError");
        assert!(err.source().is_some());

        assert_eq!(ResearchError::state_shape("content").kind(), "StateShapeError");
        assert_eq!(ResearchError::ReportAssembly("split".into()).kind(), "ReportAssemblyError");
        assert_eq!(ResearchError::from(RetrievalError::Timeout).kind(), "RetrievalError");
    }
}
