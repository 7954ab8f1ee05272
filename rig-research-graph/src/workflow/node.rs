//! Node functions and their vertex wrapper
//!
//! A node is an async function of the current state that returns a partial
//! update. Failures are not errors at this level: a node that catches a
//! model or retrieval failure records it in the error envelope and returns
//! `NodeOutput::Failed`, which lets the graph take an error edge.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::envelope::ErrorDelta;
use crate::pregel::error::PregelError;
use crate::pregel::state::WorkflowState;
use crate::pregel::vertex::{ComputeContext, ComputeResult, StateUpdate, Vertex, VertexId};

/// Result of running a node
#[derive(Debug, Clone)]
pub enum NodeOutput<U> {
    Update(U),
    /// The update records a failure
    Failed(U),
}

impl<U: StateUpdate> NodeOutput<U> {
    pub fn update(update: U) -> Self {
        NodeOutput::Update(update)
    }

    /// A failed output that carries only an error envelope delta
    pub fn failed(delta: ErrorDelta) -> Self
    where
        U: From<ErrorDelta>,
    {
        NodeOutput::Failed(U::from(delta))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, NodeOutput::Failed(_))
    }

    pub fn into_update(self) -> U {
        match self {
            NodeOutput::Update(update) | NodeOutput::Failed(update) => update,
        }
    }

    fn into_compute_result(self) -> ComputeResult<U> {
        match self {
            NodeOutput::Update(update) => ComputeResult::halt(update),
            NodeOutput::Failed(update) => ComputeResult::failed(update),
        }
    }
}

/// An async node function over state `S`
#[async_trait]
pub trait Node<S: WorkflowState>: Send + Sync {
    async fn run(&self, state: S) -> NodeOutput<S::Update>;
}

#[async_trait]
impl<S, F, Fut> Node<S> for F
where
    S: WorkflowState,
    F: Fn(S) -> Fut + Send + Sync,
    Fut: Future<Output = NodeOutput<S::Update>> + Send,
{
    async fn run(&self, state: S) -> NodeOutput<S::Update> {
        (self)(state).await
    }
}

/// Adapts a `Node` to the Pregel `Vertex` interface
pub struct NodeVertex<S: WorkflowState> {
    id: VertexId,
    node: Arc<dyn Node<S>>,
}

impl<S: WorkflowState> NodeVertex<S> {
    pub fn new(id: impl Into<VertexId>, node: Arc<dyn Node<S>>) -> Self {
        Self {
            id: id.into(),
            node,
        }
    }
}

#[async_trait]
impl<S: WorkflowState> Vertex<S> for NodeVertex<S> {
    fn id(&self) -> &VertexId {
        &self.id
    }

    async fn compute(
        &self,
        ctx: &ComputeContext<'_, S>,
    ) -> Result<ComputeResult<S::Update>, PregelError> {
        let output = self.node.run(ctx.state.clone()).await;
        if output.is_failed() {
            tracing::debug!(node = %self.id, superstep = ctx.superstep, "node reported failure");
        }
        Ok(output.into_compute_result())
    }
}
