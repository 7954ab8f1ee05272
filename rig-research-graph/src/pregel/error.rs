//! Engine errors
//!
//! Only the engine itself fails a run. Node-level failures (model, retrieval,
//! report assembly) never surface here; they travel inside state updates.

use std::error::Error as StdError;
use std::time::Duration;

use super::vertex::VertexId;
use thiserror::Error;

type BoxedSource = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum PregelError {
    #[error("run exceeded {0} supersteps")]
    MaxSuperstepsExceeded(usize),

    #[error("vertex '{0}' timed out")]
    VertexTimeout(VertexId),

    /// A vertex's compute returned an error
    #[error("vertex '{vertex_id}' failed: {message}")]
    VertexError {
        vertex_id: VertexId,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// A router picked a target the graph does not declare
    #[error("vertex '{vertex_id}' routed badly: {decision}")]
    RoutingError { vertex_id: VertexId, decision: String },

    #[error("state: {0}")]
    StateError(String),

    #[error("checkpoint: {0}")]
    CheckpointError(String),

    #[error("config: {0}")]
    ConfigError(String),

    #[error("run exceeded {0:?}")]
    WorkflowTimeout(Duration),

    #[error("vertex '{vertex_id}' still failing after {attempts} attempts")]
    MaxRetriesExceeded { vertex_id: VertexId, attempts: usize },

    /// One child run of a fan-out failed
    #[error("Branch {index} failed: {source}")]
    Branch {
        index: usize,
        #[source]
        source: Box<PregelError>,
    },

    /// A checkpoint written by another workflow was offered for resume
    #[error("checkpoint belongs to workflow '{found}', not '{expected}'")]
    CheckpointMismatch { expected: String, found: String },
}

impl PregelError {
    pub fn vertex_error(vertex_id: impl Into<VertexId>, message: impl Into<String>) -> Self {
        Self::VertexError {
            vertex_id: vertex_id.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn vertex_error_with_source(
        vertex_id: impl Into<VertexId>,
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::VertexError {
            vertex_id: vertex_id.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn routing_error(vertex_id: impl Into<VertexId>, decision: impl Into<String>) -> Self {
        Self::RoutingError {
            vertex_id: vertex_id.into(),
            decision: decision.into(),
        }
    }

    pub fn checkpoint_error(message: impl Into<String>) -> Self {
        Self::CheckpointError(message.into())
    }

    pub fn state_error(message: impl Into<String>) -> Self {
        Self::StateError(message.into())
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    pub fn branch(index: usize, source: PregelError) -> Self {
        Self::Branch {
            index,
            source: Box::new(source),
        }
    }

    pub fn checkpoint_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::CheckpointMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Vertex-local failures the runtime may retry under its `RetryPolicy`
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::VertexTimeout(_) | Self::VertexError { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::VertexTimeout(_) | Self::WorkflowTimeout(_))
    }
}
