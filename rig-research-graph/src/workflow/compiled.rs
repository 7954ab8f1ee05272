//! CompiledWorkflow: a validated graph ready to run
//!
//! ```ignore
//! let workflow = WorkflowGraph::<MyState>::new()
//!     .name("my_workflow")
//!     .node("start", start)
//!     .node("process", process)
//!     .entry("start")
//!     .edge("start", "process")
//!     .edge("process", END)
//!     .compile()?;
//!
//! let result = workflow.invoke(initial_state).await?;
//! ```
//!
//! A compiled workflow is cheap to clone and can be invoked any number of
//! times, including concurrently; every invocation has its own cursor.

use futures::channel::mpsc::{self, UnboundedReceiver};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;

use crate::pregel::checkpoint::{Checkpoint, Checkpointer};
use crate::pregel::error::PregelError;
use crate::pregel::runtime::{PregelRuntime, RunContext, WorkflowEvent, WorkflowResult};
use crate::pregel::state::WorkflowState;

/// A compiled, runnable workflow graph
pub struct CompiledWorkflow<S>
where
    S: WorkflowState,
{
    name: String,
    workflow_id: String,
    runtime: Arc<PregelRuntime<S>>,
    checkpointer: Option<Arc<dyn Checkpointer<S>>>,
}

impl<S: WorkflowState> Clone for CompiledWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            workflow_id: self.workflow_id.clone(),
            runtime: Arc::clone(&self.runtime),
            checkpointer: self.checkpointer.clone(),
        }
    }
}

impl<S> CompiledWorkflow<S>
where
    S: WorkflowState,
{
    pub(crate) fn new(name: String, runtime: PregelRuntime<S>) -> Self {
        let workflow_id = if name.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            format!("{}-{}", name, uuid::Uuid::new_v4())
        };
        Self {
            name,
            workflow_id,
            runtime: Arc::new(runtime),
            checkpointer: None,
        }
    }

    /// Persist interrupt (and periodic) checkpoints with `checkpointer`
    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer<S>>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Use a fixed workflow id, needed to resume across processes
    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = workflow_id.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn runtime(&self) -> &PregelRuntime<S> {
        &self.runtime
    }

    pub fn checkpointer(&self) -> Option<&Arc<dyn Checkpointer<S>>> {
        self.checkpointer.as_ref()
    }

    pub fn has_checkpointer(&self) -> bool {
        self.checkpointer.is_some()
    }

    fn run_context(&self) -> RunContext<S> {
        let ctx = RunContext::new(self.workflow_id.clone());
        match &self.checkpointer {
            Some(checkpointer) => ctx.with_checkpointer(Arc::clone(checkpointer)),
            None => ctx,
        }
    }

    /// Run from the entry point until completion or an interrupt
    pub async fn invoke(&self, initial_state: S) -> Result<WorkflowResult<S>, PregelError> {
        self.runtime.run(initial_state, &self.run_context()).await
    }

    /// Run in the background, yielding progress events
    pub fn stream(&self, initial_state: S) -> WorkflowStream<S> {
        let (tx, rx) = mpsc::unbounded();
        let ctx = self.run_context().with_events(tx);
        let runtime = Arc::clone(&self.runtime);
        let handle = tokio::spawn(async move { runtime.run(initial_state, &ctx).await });
        WorkflowStream { events: rx, handle }
    }

    /// Continue from `checkpoint`, applying `update` (e.g. human feedback) first
    pub async fn resume(
        &self,
        checkpoint: Checkpoint<S>,
        update: Option<S::Update>,
    ) -> Result<WorkflowResult<S>, PregelError> {
        self.runtime
            .resume(checkpoint, update, &self.run_context())
            .await
    }

    /// Continue from the checkpointer's latest checkpoint
    ///
    /// Returns `Ok(None)` when there is no checkpointer or no checkpoint.
    pub async fn resume_latest(
        &self,
        update: Option<S::Update>,
    ) -> Result<Option<WorkflowResult<S>>, PregelError> {
        let Some(checkpointer) = &self.checkpointer else {
            return Ok(None);
        };
        match checkpointer.latest().await? {
            Some(checkpoint) => self.resume(checkpoint, update).await.map(Some),
            None => Ok(None),
        }
    }

    /// Generate a Mermaid diagram of the graph
    pub fn to_mermaid(&self) -> String {
        self.runtime.to_mermaid()
    }

    /// Mermaid diagram with the vertices pending in `checkpoint` highlighted
    pub fn to_mermaid_with_frontier(&self, checkpoint: &Checkpoint<S>) -> String {
        self.runtime.to_mermaid_with_frontier(checkpoint)
    }
}

/// Event stream of a background run
///
/// Yields `WorkflowEvent`s until the run stops; call `finish` for the result.
pub struct WorkflowStream<S: WorkflowState> {
    events: UnboundedReceiver<WorkflowEvent<S>>,
    handle: JoinHandle<Result<WorkflowResult<S>, PregelError>>,
}

impl<S: WorkflowState> WorkflowStream<S> {
    /// Wait for the run to finish
    pub async fn finish(self) -> Result<WorkflowResult<S>, PregelError> {
        self.handle
            .await
            .map_err(|e| PregelError::state_error(format!("workflow task failed: {e}")))?
    }
}

impl<S: WorkflowState> Stream for WorkflowStream<S> {
    type Item = WorkflowEvent<S>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_next_unpin(cx)
    }
}
