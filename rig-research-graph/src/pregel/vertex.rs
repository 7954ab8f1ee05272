//! Vertices: the units a superstep computes
//!
//! A vertex sees the state as of the previous barrier plus its inbox and
//! returns an update and a routing decision. Nothing it writes is visible
//! to its siblings until the barrier.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::PregelError;
use super::message::WorkflowMessage;
use super::state::WorkflowState;

/// Node name, unique within one graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(pub String);

impl VertexId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VertexId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for VertexId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shape hint used when rendering the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VertexKind {
    /// Plain node function
    #[default]
    Task,
    /// Vertex that runs a compiled child workflow per fan-out branch
    Subgraph,
}

/// Trait for state updates produced by vertex computation
///
/// Updates from one superstep are merged in frontier order, so `merge`
/// receives the later write.
pub trait StateUpdate: Clone + Send + Sync + 'static {
    fn empty() -> Self;

    fn is_empty(&self) -> bool;

    /// Fold a later update into this one
    fn merge(&mut self, later: Self);
}

/// Context provided to a vertex during computation
pub struct ComputeContext<'a, S> {
    /// Messages received for this superstep
    pub messages: &'a [WorkflowMessage],
    /// Current superstep number (0-indexed)
    pub superstep: usize,
    /// Read-only access to workflow state
    pub state: &'a S,
    vertex_id: VertexId,
}

impl<'a, S> ComputeContext<'a, S> {
    pub fn new(
        vertex_id: VertexId,
        messages: &'a [WorkflowMessage],
        superstep: usize,
        state: &'a S,
    ) -> Self {
        Self {
            messages,
            superstep,
            state,
            vertex_id,
        }
    }

    pub fn id(&self) -> &VertexId {
        &self.vertex_id
    }

    pub fn is_first_superstep(&self) -> bool {
        self.superstep == 0
    }

    /// Payloads of all data messages, in delivery order
    pub fn data_payloads(&self) -> Vec<&serde_json::Value> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                WorkflowMessage::Data { value, .. } => Some(value),
                WorkflowMessage::Activate => None,
            })
            .collect()
    }
}

/// How a vertex computation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Normal completion; outgoing edges are followed
    Success,
    /// The vertex recorded a failure in its update; an error edge is
    /// followed when one is declared
    Failed,
}

/// Result of a vertex computation
#[derive(Debug, Clone)]
pub struct ComputeResult<U: StateUpdate> {
    /// State update to apply
    pub update: U,
    pub outcome: Outcome,
}

impl<U: StateUpdate> ComputeResult<U> {
    /// Successful completion with an update
    pub fn halt(update: U) -> Self {
        Self {
            update,
            outcome: Outcome::Success,
        }
    }

    /// Failed completion; the update carries the recorded error
    pub fn failed(update: U) -> Self {
        Self {
            update,
            outcome: Outcome::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }
}

/// A node of the graph as the runtime sees it
///
/// `workflow::NodeVertex` adapts plain async functions; `SubgraphVertex`
/// runs a compiled child workflow per fan-out branch.
#[async_trait]
pub trait Vertex<S>: Send + Sync
where
    S: WorkflowState,
{
    fn id(&self) -> &VertexId;

    /// Shape used in Mermaid output
    fn kind(&self) -> VertexKind {
        VertexKind::Task
    }

    /// Execute the vertex computation for one superstep
    ///
    /// Errors returned here are engine failures (timeouts, broken
    /// invariants). Domain failures belong in `ComputeResult::failed`.
    async fn compute(
        &self,
        ctx: &ComputeContext<'_, S>,
    ) -> Result<ComputeResult<S::Update>, PregelError>;
}

pub type BoxedVertex<S> = Arc<dyn Vertex<S>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pregel::state::{UnitState, UnitUpdate};
    use serde_json::json;

    struct NoopVertex {
        id: VertexId,
    }

    #[async_trait]
    impl Vertex<UnitState> for NoopVertex {
        fn id(&self) -> &VertexId {
            &self.id
        }

        async fn compute(
            &self,
            _ctx: &ComputeContext<'_, UnitState>,
        ) -> Result<ComputeResult<UnitUpdate>, PregelError> {
            Ok(ComputeResult::halt(UnitUpdate))
        }
    }

    #[test]
    fn test_vertex_id_creation() {
        let id1 = VertexId::new("planner");
        let id2 = VertexId::from("planner");
        let id3: VertexId = "planner".into();

        assert_eq!(id1, id2);
        assert_eq!(id2, id3);
        assert_eq!(id1.as_str(), "planner");
        assert_eq!(id1.to_string(), "planner");
    }

    #[test]
    fn test_compute_result_outcomes() {
        assert!(!ComputeResult::halt(UnitUpdate).is_failed());
        assert!(ComputeResult::failed(UnitUpdate).is_failed());
    }

    #[test]
    fn test_data_payloads_skip_activations() {
        let messages = vec![
            WorkflowMessage::Activate,
            WorkflowMessage::data("spawn", json!("a")),
            WorkflowMessage::data("spawn", json!("b")),
        ];
        let ctx = ComputeContext::new(VertexId::from("x"), &messages, 0, &UnitState);

        assert_eq!(ctx.data_payloads(), vec![&json!("a"), &json!("b")]);
        assert!(ctx.is_first_superstep());
    }

    #[tokio::test]
    async fn test_boxed_vertex_compute() {
        let vertex: BoxedVertex<UnitState> = Arc::new(NoopVertex {
            id: VertexId::from("noop"),
        });
        let ctx = ComputeContext::new(VertexId::from("noop"), &[], 3, &UnitState);

        let result = vertex.compute(&ctx).await.unwrap();
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(vertex.kind(), VertexKind::Task);
    }
}
