//! Fan-out over a compiled child workflow
//!
//! A `SubgraphVertex` receives one data message per branch (see
//! `Route::Spawn`), seeds a child state from each payload, runs every
//! branch concurrently and folds the results back into one parent update.
//! Results are merged in spawn order, independent of completion order.
//!
//! With a branch timeout each branch is bounded on its own, so one slow
//! branch fails alone instead of taking the whole vertex down with it.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::time::timeout;

use crate::pregel::error::PregelError;
use crate::pregel::state::WorkflowState;
use crate::pregel::vertex::{
    ComputeContext, ComputeResult, StateUpdate, Vertex, VertexId, VertexKind,
};
use crate::workflow::compiled::CompiledWorkflow;

static NO_PAYLOAD: Value = Value::Null;

/// Maps between a parent state and the child workflow's state
pub trait BranchMapping<P: WorkflowState, C: WorkflowState>: Send + Sync {
    /// Build a child input from the parent state and one branch payload
    fn seed(&self, parent: &P, payload: &Value) -> Result<C, PregelError>;

    /// Turn a finished child state into a parent update
    fn collect(&self, parent: &P, child: C) -> P::Update;

    /// Parent update recorded for a branch that could not finish
    fn failed(&self, parent: &P, error: &PregelError) -> P::Update;
}

/// Vertex that runs `child` once per incoming branch payload
pub struct SubgraphVertex<P, C, M>
where
    P: WorkflowState,
    C: WorkflowState,
{
    id: VertexId,
    child: CompiledWorkflow<C>,
    mapping: M,
    branch_timeout: Option<Duration>,
    _parent: PhantomData<fn() -> P>,
}

impl<P, C, M> SubgraphVertex<P, C, M>
where
    P: WorkflowState,
    C: WorkflowState,
    M: BranchMapping<P, C>,
{
    pub fn new(id: impl Into<VertexId>, child: CompiledWorkflow<C>, mapping: M) -> Self {
        Self {
            id: id.into(),
            child,
            mapping,
            branch_timeout: None,
            _parent: PhantomData,
        }
    }

    /// Keep this below the engine's `vertex_timeout`.
    pub fn with_branch_timeout(mut self, limit: Duration) -> Self {
        self.branch_timeout = Some(limit);
        self
    }

    pub fn branch_timeout(&self) -> Option<Duration> {
        self.branch_timeout
    }

    async fn run_bounded(&self, parent: &P, index: usize, payload: &Value) -> Result<C, PregelError> {
        match self.branch_timeout {
            Some(limit) => timeout(limit, self.run_branch(parent, index, payload))
                .await
                .unwrap_or_else(|_| Err(PregelError::WorkflowTimeout(limit))),
            None => self.run_branch(parent, index, payload).await,
        }
    }

    async fn run_branch(&self, parent: &P, index: usize, payload: &Value) -> Result<C, PregelError> {
        let seed = self.mapping.seed(parent, payload)?;
        let result = self.child.invoke(seed).await?;
        if result.is_interrupted() {
            return Err(PregelError::state_error(
                "child workflow paused at an interrupt",
            ));
        }
        tracing::debug!(
            vertex = %self.id,
            branch = index,
            supersteps = result.supersteps,
            "branch finished"
        );
        Ok(result.state)
    }
}

#[async_trait]
impl<P, C, M> Vertex<P> for SubgraphVertex<P, C, M>
where
    P: WorkflowState,
    C: WorkflowState,
    M: BranchMapping<P, C> + 'static,
{
    fn id(&self) -> &VertexId {
        &self.id
    }

    fn kind(&self) -> VertexKind {
        VertexKind::Subgraph
    }

    async fn compute(
        &self,
        ctx: &ComputeContext<'_, P>,
    ) -> Result<ComputeResult<P::Update>, PregelError> {
        let mut payloads = ctx.data_payloads();
        if payloads.is_empty() {
            // Activated by a plain edge: a single branch without payload.
            payloads.push(&NO_PAYLOAD);
        }

        tracing::info!(vertex = %self.id, branches = payloads.len(), "dispatching branches");
        let parent = ctx.state;
        let results = join_all(
            payloads
                .iter()
                .enumerate()
                .map(|(index, payload)| self.run_bounded(parent, index, payload)),
        )
        .await;

        let mut merged = P::Update::empty();
        for (index, result) in results.into_iter().enumerate() {
            let update = match result {
                Ok(child) => self.mapping.collect(parent, child),
                Err(e) => {
                    let error = PregelError::branch(index, e);
                    tracing::warn!(vertex = %self.id, branch = index, error = %error, "branch failed");
                    self.mapping.failed(parent, &error)
                }
            };
            merged.merge(update);
        }
        Ok(ComputeResult::halt(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pregel::channel::{Append, Overwrite};
    use crate::pregel::edge::END;
    use crate::pregel::message::WorkflowMessage;
    use crate::workflow::graph::WorkflowGraph;
    use crate::workflow::node::NodeOutput;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::time::Duration;

    #[derive(Clone, Default, Debug, Serialize, Deserialize)]
    struct Parent {
        results: Vec<String>,
    }

    #[derive(Clone, Default, Debug)]
    struct ParentUpdate {
        results: Append<String>,
    }

    impl StateUpdate for ParentUpdate {
        fn empty() -> Self {
            Self::default()
        }

        fn is_empty(&self) -> bool {
            self.results.is_empty()
        }

        fn merge(&mut self, later: Self) {
            self.results.merge(later.results);
        }
    }

    impl WorkflowState for Parent {
        type Update = ParentUpdate;

        fn apply_update(&self, update: Self::Update) -> Self {
            let mut next = self.clone();
            update.results.apply_to(&mut next.results);
            next
        }
    }

    #[derive(Clone, Default, Debug, Serialize, Deserialize)]
    struct Child {
        delay_ms: u64,
        output: String,
    }

    #[derive(Clone, Default, Debug)]
    struct ChildUpdate {
        output: Overwrite<String>,
    }

    impl StateUpdate for ChildUpdate {
        fn empty() -> Self {
            Self::default()
        }

        fn is_empty(&self) -> bool {
            !self.output.is_set()
        }

        fn merge(&mut self, later: Self) {
            self.output.merge(later.output);
        }
    }

    impl WorkflowState for Child {
        type Update = ChildUpdate;

        fn apply_update(&self, update: Self::Update) -> Self {
            let mut next = self.clone();
            update.output.apply_to(&mut next.output);
            next
        }
    }

    async fn work(state: Child) -> NodeOutput<ChildUpdate> {
        tokio::time::sleep(Duration::from_millis(state.delay_ms)).await;
        NodeOutput::update(ChildUpdate {
            output: Overwrite::new(format!("done after {}ms", state.delay_ms)),
        })
    }

    struct DelayMapping;

    impl BranchMapping<Parent, Child> for DelayMapping {
        fn seed(&self, _parent: &Parent, payload: &Value) -> Result<Child, PregelError> {
            let delay_ms = payload
                .as_u64()
                .ok_or_else(|| PregelError::state_error("payload is not a delay"))?;
            Ok(Child {
                delay_ms,
                output: String::new(),
            })
        }

        fn collect(&self, _parent: &Parent, child: Child) -> ParentUpdate {
            ParentUpdate {
                results: Append::one(child.output),
            }
        }

        fn failed(&self, _parent: &Parent, error: &PregelError) -> ParentUpdate {
            ParentUpdate {
                results: Append::one(format!("failed: {error}")),
            }
        }
    }

    fn vertex() -> SubgraphVertex<Parent, Child, DelayMapping> {
        let child = WorkflowGraph::new()
            .name("child")
            .node("work", work)
            .entry("work")
            .edge("work", END)
            .compile()
            .unwrap();
        SubgraphVertex::new("fan_out", child, DelayMapping)
    }

    #[tokio::test]
    async fn test_results_merge_in_spawn_order() {
        let vertex = vertex();
        let messages = vec![
            WorkflowMessage::data("spawn", json!(40)),
            WorkflowMessage::data("spawn", json!(1)),
            WorkflowMessage::data("spawn", json!("not a number")),
        ];
        let parent = Parent::default();
        let ctx = ComputeContext::new(VertexId::from("fan_out"), &messages, 0, &parent);

        let result = vertex.compute(&ctx).await.unwrap();
        let next = parent.apply_update(result.update);

        assert_eq!(next.results.len(), 3);
        assert_eq!(next.results[0], "done after 40ms");
        assert_eq!(next.results[1], "done after 1ms");
        assert!(next.results[2].starts_with("failed: Branch 2 failed"));
        assert_eq!(vertex.kind(), VertexKind::Subgraph);
    }

    #[tokio::test]
    async fn test_slow_branch_times_out_alone() {
        let vertex = vertex().with_branch_timeout(Duration::from_millis(50));
        let messages = vec![
            WorkflowMessage::data("spawn", json!(5_000)),
            WorkflowMessage::data("spawn", json!(1)),
        ];
        let parent = Parent::default();
        let ctx = ComputeContext::new(VertexId::from("fan_out"), &messages, 0, &parent);

        let result = vertex.compute(&ctx).await.unwrap();
        let next = parent.apply_update(result.update);

        assert_eq!(
            next.results,
            vec![
                "failed: Branch 0 failed: run exceeded 50ms".to_string(),
                "done after 1ms".to_string(),
            ]
        );
        assert_eq!(vertex.branch_timeout(), Some(Duration::from_millis(50)));
    }
}
