//! Pregel Runtime - Core execution engine for workflow graphs
//!
//! The runtime executes workflows through synchronized supersteps. Each
//! superstep follows the sequence: Deliver → Compute → Merge → Route.
//!
//! The runtime itself is immutable once built; every run keeps its own
//! cursor (superstep, frontier, join progress), so a single runtime can be
//! shared behind an `Arc` and run many times concurrently.

use futures::channel::mpsc::UnboundedSender;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use super::checkpoint::{Checkpoint, Checkpointer};
use super::config::{PregelConfig, RetryPolicy};
use super::edge::{ConditionalEdge, JoinEdge, Route, Router, END};
use super::error::PregelError;
use super::message::{Frontier, Inbox, WorkflowMessage, SPAWN_KEY};
use super::state::WorkflowState;
use super::vertex::{BoxedVertex, ComputeContext, ComputeResult, Outcome, VertexId};
use super::visualization::{
    mark_pending, render_channels, render_edge, render_node, render_terminals, EdgeStyle,
    START_ID, STYLE_DEFS,
};

/// How a run stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// No vertex is left to run
    Completed,
    /// Paused before interrupt vertices; resume from the returned checkpoint
    Interrupted { before: Vec<VertexId> },
}

/// Result of a workflow execution
#[derive(Debug, Clone)]
pub struct WorkflowResult<S: WorkflowState> {
    /// Final (or paused) workflow state
    pub state: S,
    /// Number of supersteps executed, counted from the start of the run
    pub supersteps: usize,
    pub status: RunStatus,
    /// Snapshot to resume from when the run was interrupted
    pub checkpoint: Option<Checkpoint<S>>,
}

impl<S: WorkflowState> WorkflowResult<S> {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self.status, RunStatus::Interrupted { .. })
    }
}

/// Progress notifications emitted while a run executes
#[derive(Debug, Clone)]
pub enum WorkflowEvent<S> {
    SuperstepStarted {
        superstep: usize,
        vertices: Vec<VertexId>,
    },
    VertexCompleted {
        superstep: usize,
        vertex: VertexId,
        outcome: Outcome,
    },
    /// Merged state after a superstep
    StateUpdated { superstep: usize, state: S },
    CheckpointSaved { superstep: usize },
    Interrupted {
        superstep: usize,
        before: Vec<VertexId>,
    },
    Completed { supersteps: usize },
}

/// Per-run collaborators: identity, persistence and event sink
pub struct RunContext<S: WorkflowState> {
    pub workflow_id: String,
    pub checkpointer: Option<Arc<dyn Checkpointer<S>>>,
    pub events: Option<UnboundedSender<WorkflowEvent<S>>>,
}

impl<S: WorkflowState> Clone for RunContext<S> {
    fn clone(&self) -> Self {
        Self {
            workflow_id: self.workflow_id.clone(),
            checkpointer: self.checkpointer.clone(),
            events: self.events.clone(),
        }
    }
}

impl<S: WorkflowState> RunContext<S> {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            checkpointer: None,
            events: None,
        }
    }

    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer<S>>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<WorkflowEvent<S>>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: impl FnOnce() -> WorkflowEvent<S>) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = events.unbounded_send(event());
        }
    }
}

/// Mutable position of one run
struct Cursor {
    superstep: usize,
    frontier: Frontier,
    join_progress: Vec<Vec<VertexId>>,
    skip_interrupt: bool,
}

/// Pregel Runtime for executing workflow graphs
pub struct PregelRuntime<S>
where
    S: WorkflowState,
{
    config: PregelConfig,
    vertices: HashMap<VertexId, BoxedVertex<S>>,
    /// Declaration order, used for rendering
    order: Vec<VertexId>,
    edges: HashMap<VertexId, Vec<VertexId>>,
    conditional: HashMap<VertexId, ConditionalEdge<S>>,
    joins: Vec<JoinEdge>,
    error_edges: HashMap<VertexId, VertexId>,
    interrupt_before: Vec<VertexId>,
    entry: Option<VertexId>,
}

impl<S> PregelRuntime<S>
where
    S: WorkflowState,
{
    /// Create a new runtime with default configuration
    pub fn new() -> Self {
        Self::with_config(PregelConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: PregelConfig) -> Self {
        Self {
            config,
            vertices: HashMap::new(),
            order: Vec::new(),
            edges: HashMap::new(),
            conditional: HashMap::new(),
            joins: Vec::new(),
            error_edges: HashMap::new(),
            interrupt_before: Vec::new(),
            entry: None,
        }
    }

    /// Add a vertex; a vertex with the same id is replaced
    pub fn add_vertex(&mut self, vertex: BoxedVertex<S>) -> &mut Self {
        let id = vertex.id().clone();
        if !self.order.contains(&id) {
            self.order.push(id.clone());
        }
        self.vertices.insert(id, vertex);
        self
    }

    /// Add a direct edge; `to` may be `END`
    pub fn add_edge(&mut self, from: impl Into<VertexId>, to: impl Into<VertexId>) -> &mut Self {
        let targets = self.edges.entry(from.into()).or_default();
        let to = to.into();
        if !targets.contains(&to) {
            targets.push(to);
        }
        self
    }

    /// Attach a router to `from`; its decisions must name one of `targets` or `END`
    pub fn add_conditional_edge(
        &mut self,
        from: impl Into<VertexId>,
        router: Arc<dyn Router<S>>,
        targets: Vec<VertexId>,
    ) -> &mut Self {
        self.conditional
            .insert(from.into(), ConditionalEdge { router, targets });
        self
    }

    /// Activate `target` once all `sources` have completed
    pub fn add_join(&mut self, sources: Vec<VertexId>, target: impl Into<VertexId>) -> &mut Self {
        self.joins.push(JoinEdge {
            sources,
            target: target.into(),
        });
        self
    }

    /// Route failed outcomes of `from` to `to`
    pub fn add_error_edge(&mut self, from: impl Into<VertexId>, to: impl Into<VertexId>) -> &mut Self {
        self.error_edges.insert(from.into(), to.into());
        self
    }

    /// Pause before `vertex` runs until the caller resumes
    pub fn add_interrupt(&mut self, vertex: impl Into<VertexId>) -> &mut Self {
        let vertex = vertex.into();
        if !self.interrupt_before.contains(&vertex) {
            self.interrupt_before.push(vertex);
        }
        self
    }

    /// Set the entry vertex
    pub fn set_entry(&mut self, entry: impl Into<VertexId>) -> &mut Self {
        self.entry = Some(entry.into());
        self
    }

    pub fn config(&self) -> &PregelConfig {
        &self.config
    }

    pub fn entry(&self) -> Option<&VertexId> {
        self.entry.as_ref()
    }

    pub fn has_vertex(&self, id: &VertexId) -> bool {
        self.vertices.contains_key(id)
    }

    pub fn vertex_ids(&self) -> &[VertexId] {
        &self.order
    }

    pub fn interrupts(&self) -> &[VertexId] {
        &self.interrupt_before
    }

    /// Run from the entry vertex
    ///
    /// Enforces the configured `workflow_timeout`.
    pub async fn run(
        &self,
        initial_state: S,
        ctx: &RunContext<S>,
    ) -> Result<WorkflowResult<S>, PregelError> {
        let entry = self
            .entry
            .as_ref()
            .ok_or_else(|| PregelError::config_error("workflow has no entry vertex"))?;

        let mut frontier = Frontier::new();
        frontier.activate(entry);
        let cursor = Cursor {
            superstep: 0,
            frontier,
            join_progress: vec![Vec::new(); self.joins.len()],
            skip_interrupt: false,
        };

        tracing::info!(workflow_id = %ctx.workflow_id, entry = %entry, "workflow started");
        self.run_with_timeout(initial_state, cursor, ctx).await
    }

    /// Continue a run from a checkpoint, optionally applying a state update first
    ///
    /// The interrupt that produced the checkpoint is not raised again for
    /// the first resumed superstep.
    pub async fn resume(
        &self,
        checkpoint: Checkpoint<S>,
        update: Option<S::Update>,
        ctx: &RunContext<S>,
    ) -> Result<WorkflowResult<S>, PregelError> {
        if checkpoint.workflow_id != ctx.workflow_id {
            return Err(PregelError::checkpoint_mismatch(
                &ctx.workflow_id,
                &checkpoint.workflow_id,
            ));
        }
        if let Some(unknown) = checkpoint
            .frontier
            .vertices()
            .into_iter()
            .find(|v| !self.vertices.contains_key(v))
        {
            return Err(PregelError::checkpoint_error(format!(
                "checkpoint schedules unknown vertex '{unknown}'"
            )));
        }

        let join_progress = if checkpoint.join_progress.is_empty() {
            vec![Vec::new(); self.joins.len()]
        } else if checkpoint.join_progress.len() == self.joins.len() {
            checkpoint.join_progress
        } else {
            return Err(PregelError::checkpoint_error(format!(
                "checkpoint has {} join entries, graph has {}",
                checkpoint.join_progress.len(),
                self.joins.len()
            )));
        };

        let state = match update {
            Some(update) => checkpoint.state.apply_update(update),
            None => checkpoint.state,
        };
        let cursor = Cursor {
            superstep: checkpoint.superstep,
            skip_interrupt: !checkpoint.interrupted_before.is_empty(),
            frontier: checkpoint.frontier,
            join_progress,
        };

        tracing::info!(
            workflow_id = %ctx.workflow_id,
            superstep = cursor.superstep,
            "workflow resumed"
        );
        self.run_with_timeout(state, cursor, ctx).await
    }

    async fn run_with_timeout(
        &self,
        state: S,
        cursor: Cursor,
        ctx: &RunContext<S>,
    ) -> Result<WorkflowResult<S>, PregelError> {
        let workflow_timeout = self.config.workflow_timeout;
        match timeout(workflow_timeout, self.execute(state, cursor, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(PregelError::WorkflowTimeout(workflow_timeout)),
        }
    }

    async fn execute(
        &self,
        mut state: S,
        mut cursor: Cursor,
        ctx: &RunContext<S>,
    ) -> Result<WorkflowResult<S>, PregelError> {
        loop {
            if cursor.frontier.is_empty() || state.is_terminal() {
                tracing::info!(
                    workflow_id = %ctx.workflow_id,
                    supersteps = cursor.superstep,
                    "workflow completed"
                );
                let supersteps = cursor.superstep;
                ctx.emit(|| WorkflowEvent::Completed { supersteps });
                return Ok(WorkflowResult {
                    state,
                    supersteps,
                    status: RunStatus::Completed,
                    checkpoint: None,
                });
            }

            if cursor.superstep >= self.config.max_supersteps {
                return Err(PregelError::MaxSuperstepsExceeded(cursor.superstep));
            }

            if !cursor.skip_interrupt {
                let before: Vec<VertexId> = self
                    .interrupt_before
                    .iter()
                    .filter(|v| cursor.frontier.contains(v))
                    .cloned()
                    .collect();
                if !before.is_empty() {
                    let checkpoint = self
                        .snapshot(ctx, &state, &cursor)
                        .with_interrupt(before.clone());
                    if let Some(checkpointer) = &ctx.checkpointer {
                        checkpointer.save(&checkpoint).await?;
                    }
                    tracing::info!(
                        workflow_id = %ctx.workflow_id,
                        superstep = cursor.superstep,
                        before = ?before,
                        "workflow interrupted"
                    );
                    let superstep = cursor.superstep;
                    let paused = before.clone();
                    ctx.emit(|| WorkflowEvent::Interrupted {
                        superstep,
                        before: paused,
                    });
                    return Ok(WorkflowResult {
                        state,
                        supersteps: superstep,
                        status: RunStatus::Interrupted { before },
                        checkpoint: Some(checkpoint),
                    });
                }
            }
            cursor.skip_interrupt = false;

            let superstep = cursor.superstep;
            let inboxes = std::mem::take(&mut cursor.frontier).into_inboxes();
            if self.config.tracing_enabled {
                let names: Vec<&str> = inboxes.iter().map(|i| i.vertex.as_str()).collect();
                tracing::debug!(superstep, vertices = ?names, "superstep started");
            }
            ctx.emit(|| WorkflowEvent::SuperstepStarted {
                superstep,
                vertices: inboxes.iter().map(|i| i.vertex.clone()).collect(),
            });

            let results = self.compute_vertices(superstep, &state, inboxes).await?;

            let mut outcomes = Vec::with_capacity(results.len());
            let mut updates = Vec::with_capacity(results.len());
            for (vertex, result) in results {
                let outcome = result.outcome;
                ctx.emit(|| WorkflowEvent::VertexCompleted {
                    superstep,
                    vertex: vertex.clone(),
                    outcome,
                });
                outcomes.push((vertex, outcome));
                updates.push(result.update);
            }

            state = state.apply_updates(updates);
            cursor.frontier = self.route(&state, &outcomes, &mut cursor.join_progress)?;
            cursor.superstep += 1;

            ctx.emit(|| WorkflowEvent::StateUpdated {
                superstep,
                state: state.clone(),
            });

            if let Some(checkpointer) = &ctx.checkpointer {
                if self.config.should_checkpoint(cursor.superstep) {
                    checkpointer
                        .save(&self.snapshot(ctx, &state, &cursor))
                        .await?;
                    let saved = cursor.superstep;
                    ctx.emit(|| WorkflowEvent::CheckpointSaved { superstep: saved });
                }
            }
        }
    }

    fn snapshot(&self, ctx: &RunContext<S>, state: &S, cursor: &Cursor) -> Checkpoint<S> {
        Checkpoint::new(
            ctx.workflow_id.clone(),
            cursor.superstep,
            state.clone(),
            cursor.frontier.clone(),
        )
        .with_join_progress(cursor.join_progress.clone())
    }

    /// Compute the frontier in parallel; results come back in frontier order
    async fn compute_vertices(
        &self,
        superstep: usize,
        state: &S,
        inboxes: Vec<Inbox>,
    ) -> Result<Vec<(VertexId, ComputeResult<S::Update>)>, PregelError> {
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
        let mut handles = Vec::with_capacity(inboxes.len());

        for inbox in inboxes {
            let vertex = self.vertices.get(&inbox.vertex).cloned().ok_or_else(|| {
                PregelError::state_error(format!("no vertex registered as '{}'", inbox.vertex))
            })?;
            let vertex_id = inbox.vertex.clone();
            let state = state.clone();
            let semaphore = Arc::clone(&semaphore);
            let vertex_timeout = self.config.vertex_timeout;
            let policy = self.config.retry_policy.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| PregelError::state_error(format!("semaphore closed: {e}")))?;
                compute_with_retry(vertex, inbox, superstep, state, vertex_timeout, policy).await
            });
            handles.push((vertex_id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        let mut pending = handles.into_iter();
        while let Some((vertex_id, handle)) = pending.next() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err(PregelError::vertex_error_with_source(
                    vertex_id,
                    "task join error",
                    std::io::Error::other(join_error.to_string()),
                )),
            };
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    for (_, rest) in pending {
                        rest.abort();
                    }
                    return Err(e);
                }
            }
        }
        Ok(results)
    }

    /// Build the next frontier from this superstep's outcomes
    fn route(
        &self,
        state: &S,
        outcomes: &[(VertexId, Outcome)],
        join_progress: &mut [Vec<VertexId>],
    ) -> Result<Frontier, PregelError> {
        let mut next = Frontier::new();

        for (vertex, outcome) in outcomes {
            if *outcome == Outcome::Failed {
                if let Some(target) = self.error_edges.get(vertex) {
                    tracing::debug!(vertex = %vertex, target = %target, "following error edge");
                    if target.as_str() != END {
                        next.activate(target);
                    }
                    continue;
                }
            }

            if let Some(edge) = self.conditional.get(vertex) {
                let route = edge.router.route(state);
                tracing::debug!(vertex = %vertex, targets = ?route.targets(), "router decided");
                Self::apply_route(vertex, edge, route, &mut next)?;
            }

            if let Some(targets) = self.edges.get(vertex) {
                for target in targets.iter().filter(|t| t.as_str() != END) {
                    next.activate(target);
                }
            }

            for (join, done) in self.joins.iter().zip(join_progress.iter_mut()) {
                if !join.sources.contains(vertex) {
                    continue;
                }
                if !done.contains(vertex) {
                    done.push(vertex.clone());
                }
                if join.sources.iter().all(|s| done.contains(s)) {
                    next.activate(&join.target);
                    done.clear();
                }
            }
        }

        Ok(next)
    }

    fn apply_route(
        source: &VertexId,
        edge: &ConditionalEdge<S>,
        route: Route,
        next: &mut Frontier,
    ) -> Result<(), PregelError> {
        let resolve = |name: &str| -> Result<VertexId, PregelError> {
            let id = VertexId::from(name);
            if edge.targets.contains(&id) {
                Ok(id)
            } else {
                Err(PregelError::routing_error(
                    source.clone(),
                    format!("undeclared target '{name}'"),
                ))
            }
        };

        match route {
            Route::To(names) => {
                for name in names.iter().filter(|n| n.as_str() != END) {
                    next.activate(&resolve(name)?);
                }
            }
            Route::Spawn(spawns) => {
                if spawns.is_empty() {
                    tracing::warn!(vertex = %source, "fan-out produced no branches");
                }
                for spawn in spawns {
                    let target = resolve(&spawn.target)?;
                    next.send(&target, WorkflowMessage::data(SPAWN_KEY, spawn.payload));
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Visualization Methods
    // =========================================================================

    /// Generate a static Mermaid diagram of the workflow structure
    ///
    /// ```text
    /// graph TD
    ///     __start__([START])
    ///     __end__([END])
    ///     create_analysts[create_analysts]
    ///     human_feedback{{human_feedback}}
    ///
    ///     __start__ --> create_analysts
    ///     create_analysts --> human_feedback
    ///     human_feedback -.-> create_analysts
    /// ```
    pub fn to_mermaid(&self) -> String {
        self.render_mermaid(None)
    }

    /// Mermaid diagram with the vertices pending in `checkpoint` highlighted
    pub fn to_mermaid_with_frontier(&self, checkpoint: &Checkpoint<S>) -> String {
        self.render_mermaid(Some(&checkpoint.frontier))
    }

    fn render_mermaid(&self, pending: Option<&Frontier>) -> String {
        let mut lines = vec!["graph TD".to_string()];
        lines.extend(render_channels(S::channels()));
        lines.extend(render_terminals());

        for id in &self.order {
            if let Some(vertex) = self.vertices.get(id) {
                lines.push(render_node(id, vertex.kind(), self.interrupt_before.contains(id)));
            }
        }
        lines.push(String::new());

        if let Some(entry) = &self.entry {
            lines.push(render_edge(START_ID, entry.as_str(), EdgeStyle::Direct));
        }
        for id in &self.order {
            for target in self.edges.get(id).into_iter().flatten() {
                lines.push(render_edge(id.as_str(), target.as_str(), EdgeStyle::Direct));
            }
            if let Some(edge) = self.conditional.get(id) {
                for target in &edge.targets {
                    lines.push(render_edge(id.as_str(), target.as_str(), EdgeStyle::Conditional));
                }
            }
            if let Some(target) = self.error_edges.get(id) {
                lines.push(render_edge(id.as_str(), target.as_str(), EdgeStyle::Error));
            }
        }
        for join in &self.joins {
            for source in &join.sources {
                lines.push(render_edge(source.as_str(), join.target.as_str(), EdgeStyle::Join));
            }
        }

        let mut output = lines.join("\n");
        output.push('\n');
        if let Some(frontier) = pending {
            output.push('\n');
            output.push_str(STYLE_DEFS);
            for id in frontier.vertices() {
                output.push_str(&mark_pending(&id));
                output.push('\n');
            }
        }
        output
    }
}

impl<S> Default for PregelRuntime<S>
where
    S: WorkflowState,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Run one vertex, retrying recoverable failures with backoff
async fn compute_with_retry<S>(
    vertex: BoxedVertex<S>,
    inbox: Inbox,
    superstep: usize,
    state: S,
    vertex_timeout: Duration,
    policy: RetryPolicy,
) -> Result<(VertexId, ComputeResult<S::Update>), PregelError>
where
    S: WorkflowState,
{
    let Inbox {
        vertex: vertex_id,
        messages,
    } = inbox;
    let mut attempt = 0;

    loop {
        let ctx = ComputeContext::new(vertex_id.clone(), &messages, superstep, &state);
        let result = match timeout(vertex_timeout, vertex.compute(&ctx)).await {
            Ok(result) => result,
            Err(_) => Err(PregelError::VertexTimeout(vertex_id.clone())),
        };

        match result {
            Ok(result) => return Ok((vertex_id, result)),
            Err(e) if e.is_recoverable() && policy.max_retries > 0 => {
                if !policy.should_retry(attempt) {
                    return Err(PregelError::MaxRetriesExceeded {
                        vertex_id,
                        attempts: attempt + 1,
                    });
                }
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    vertex = %vertex_id,
                    attempt = attempt + 1,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "vertex failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pregel::channel::Append;
    use crate::pregel::edge::Spawn;
    use crate::pregel::vertex::{StateUpdate, Vertex};
    use crate::pregel::checkpoint::MemoryCheckpointer;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default, Debug, Serialize, Deserialize)]
    struct TraceState {
        visited: Vec<String>,
    }

    #[derive(Clone, Default, Debug)]
    struct TraceUpdate {
        visited: Append<String>,
    }

    impl StateUpdate for TraceUpdate {
        fn empty() -> Self {
            Self::default()
        }

        fn is_empty(&self) -> bool {
            self.visited.is_empty()
        }

        fn merge(&mut self, later: Self) {
            self.visited.merge(later.visited);
        }
    }

    impl WorkflowState for TraceState {
        type Update = TraceUpdate;

        fn apply_update(&self, update: Self::Update) -> Self {
            let mut next = self.clone();
            update.visited.apply_to(&mut next.visited);
            next
        }
    }

    /// Records its own name (plus any spawn payloads)
    struct TraceVertex {
        id: VertexId,
        fail: bool,
    }

    impl TraceVertex {
        fn boxed(name: &str) -> BoxedVertex<TraceState> {
            Arc::new(Self {
                id: VertexId::from(name),
                fail: false,
            })
        }

        fn failing(name: &str) -> BoxedVertex<TraceState> {
            Arc::new(Self {
                id: VertexId::from(name),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl Vertex<TraceState> for TraceVertex {
        fn id(&self) -> &VertexId {
            &self.id
        }

        async fn compute(
            &self,
            ctx: &ComputeContext<'_, TraceState>,
        ) -> Result<ComputeResult<TraceUpdate>, PregelError> {
            let mut entries = vec![self.id.to_string()];
            for payload in ctx.data_payloads() {
                entries.push(format!("{}:{}", self.id, payload));
            }
            let update = TraceUpdate {
                visited: Append::new(entries),
            };
            if self.fail {
                Ok(ComputeResult::failed(update))
            } else {
                Ok(ComputeResult::halt(update))
            }
        }
    }

    fn ctx() -> RunContext<TraceState> {
        RunContext::new("test-workflow")
    }

    fn fast_config() -> PregelConfig {
        PregelConfig::default().with_retry_policy(RetryPolicy::no_retry())
    }

    #[tokio::test]
    async fn test_linear_run_completes() {
        let mut runtime = PregelRuntime::with_config(fast_config());
        runtime
            .add_vertex(TraceVertex::boxed("a"))
            .add_vertex(TraceVertex::boxed("b"))
            .add_edge("a", "b")
            .add_edge("b", END)
            .set_entry("a");

        let result = runtime.run(TraceState::default(), &ctx()).await.unwrap();
        assert!(result.is_completed());
        assert_eq!(result.supersteps, 2);
        assert_eq!(result.state.visited, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_run_without_entry_is_config_error() {
        let runtime: PregelRuntime<TraceState> = PregelRuntime::new();
        let err = runtime.run(TraceState::default(), &ctx()).await.unwrap_err();
        assert!(matches!(err, PregelError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_fan_in_merges_in_frontier_order_and_join_waits() {
        let mut runtime = PregelRuntime::with_config(fast_config());
        runtime
            .add_vertex(TraceVertex::boxed("start"))
            .add_vertex(TraceVertex::boxed("left"))
            .add_vertex(TraceVertex::boxed("right"))
            .add_vertex(TraceVertex::boxed("slow"))
            .add_vertex(TraceVertex::boxed("merge"))
            .add_edge("start", "left")
            .add_edge("start", "right")
            .add_edge("left", "slow")
            .add_join(
                vec![VertexId::from("slow"), VertexId::from("right")],
                "merge",
            )
            .set_entry("start");

        let result = runtime.run(TraceState::default(), &ctx()).await.unwrap();
        assert_eq!(
            result.state.visited,
            vec!["start", "left", "right", "slow", "merge"]
        );
        assert_eq!(
            result.state.visited.iter().filter(|v| *v == "merge").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_router_spawns_branches_with_payloads() {
        let mut runtime = PregelRuntime::with_config(fast_config());
        let router = |_: &TraceState| {
            Route::Spawn(vec![
                Spawn::new("worker", json!(1)),
                Spawn::new("worker", json!(2)),
            ])
        };
        runtime
            .add_vertex(TraceVertex::boxed("dispatch"))
            .add_vertex(TraceVertex::boxed("worker"))
            .add_conditional_edge("dispatch", Arc::new(router), vec![VertexId::from("worker")])
            .set_entry("dispatch");

        let result = runtime.run(TraceState::default(), &ctx()).await.unwrap();
        assert_eq!(
            result.state.visited,
            vec!["dispatch", "worker", "worker:1", "worker:2"]
        );
    }

    #[tokio::test]
    async fn test_router_undeclared_target_is_routing_error() {
        let mut runtime = PregelRuntime::with_config(fast_config());
        let router = |_: &TraceState| Route::to("nowhere");
        runtime
            .add_vertex(TraceVertex::boxed("a"))
            .add_conditional_edge("a", Arc::new(router), vec![VertexId::from(END)])
            .set_entry("a");

        let err = runtime.run(TraceState::default(), &ctx()).await.unwrap_err();
        assert!(matches!(err, PregelError::RoutingError { .. }));
    }

    #[tokio::test]
    async fn test_failed_outcome_follows_error_edge() {
        let mut runtime = PregelRuntime::with_config(fast_config());
        runtime
            .add_vertex(TraceVertex::failing("ask"))
            .add_vertex(TraceVertex::boxed("search"))
            .add_vertex(TraceVertex::boxed("save"))
            .add_edge("ask", "search")
            .add_edge("search", "save")
            .add_error_edge("ask", "save")
            .set_entry("ask");

        let result = runtime.run(TraceState::default(), &ctx()).await.unwrap();
        assert_eq!(result.state.visited, vec!["ask", "save"]);
    }

    #[tokio::test]
    async fn test_interrupt_and_resume() {
        let mut runtime = PregelRuntime::with_config(fast_config());
        runtime
            .add_vertex(TraceVertex::boxed("plan"))
            .add_vertex(TraceVertex::boxed("review"))
            .add_vertex(TraceVertex::boxed("publish"))
            .add_edge("plan", "review")
            .add_edge("review", "publish")
            .add_interrupt("review")
            .set_entry("plan");

        let checkpointer = Arc::new(MemoryCheckpointer::new());
        let ctx = ctx().with_checkpointer(checkpointer.clone());

        let paused = runtime.run(TraceState::default(), &ctx).await.unwrap();
        assert_eq!(
            paused.status,
            RunStatus::Interrupted {
                before: vec![VertexId::from("review")]
            }
        );
        assert_eq!(paused.state.visited, vec!["plan"]);
        let checkpoint = paused.checkpoint.unwrap();
        assert_eq!(checkpointer.list().await.unwrap(), vec![1]);

        let note = TraceUpdate {
            visited: Append::one("note".to_string()),
        };
        let done = runtime.resume(checkpoint, Some(note), &ctx).await.unwrap();
        assert!(done.is_completed());
        assert_eq!(done.supersteps, 3);
        assert_eq!(done.state.visited, vec!["plan", "note", "review", "publish"]);
    }

    #[tokio::test]
    async fn test_resume_rejects_other_workflow() {
        let mut runtime = PregelRuntime::with_config(fast_config());
        runtime.add_vertex(TraceVertex::boxed("a")).set_entry("a");

        let checkpoint = Checkpoint::new("other", 0, TraceState::default(), Frontier::new());
        let err = runtime.resume(checkpoint, None, &ctx()).await.unwrap_err();
        assert!(matches!(err, PregelError::CheckpointMismatch { .. }));
    }

    #[tokio::test]
    async fn test_max_supersteps_exceeded() {
        let mut runtime = PregelRuntime::with_config(fast_config().with_max_supersteps(5));
        runtime
            .add_vertex(TraceVertex::boxed("loop"))
            .add_edge("loop", "loop")
            .set_entry("loop");

        let err = runtime.run(TraceState::default(), &ctx()).await.unwrap_err();
        assert!(matches!(err, PregelError::MaxSuperstepsExceeded(5)));
    }

    struct FlakyVertex {
        id: VertexId,
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl Vertex<TraceState> for FlakyVertex {
        fn id(&self) -> &VertexId {
            &self.id
        }

        async fn compute(
            &self,
            _ctx: &ComputeContext<'_, TraceState>,
        ) -> Result<ComputeResult<TraceUpdate>, PregelError> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(PregelError::vertex_error(self.id.clone(), "transient"));
            }
            Ok(ComputeResult::halt(TraceUpdate {
                visited: Append::one("flaky".to_string()),
            }))
        }
    }

    #[tokio::test]
    async fn test_recoverable_errors_are_retried() {
        let policy = RetryPolicy::new(3).with_backoff_base(Duration::from_millis(1));
        let mut runtime = PregelRuntime::with_config(PregelConfig::default().with_retry_policy(policy));
        runtime
            .add_vertex(Arc::new(FlakyVertex {
                id: VertexId::from("flaky"),
                failures_left: AtomicUsize::new(2),
            }))
            .set_entry("flaky");

        let result = runtime.run(TraceState::default(), &ctx()).await.unwrap();
        assert_eq!(result.state.visited, vec!["flaky"]);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let policy = RetryPolicy::new(1).with_backoff_base(Duration::from_millis(1));
        let mut runtime = PregelRuntime::with_config(PregelConfig::default().with_retry_policy(policy));
        runtime
            .add_vertex(Arc::new(FlakyVertex {
                id: VertexId::from("flaky"),
                failures_left: AtomicUsize::new(5),
            }))
            .set_entry("flaky");

        let err = runtime.run(TraceState::default(), &ctx()).await.unwrap_err();
        assert!(matches!(
            err,
            PregelError::MaxRetriesExceeded { attempts: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_events_streamed() {
        use futures::StreamExt;

        let mut runtime = PregelRuntime::with_config(fast_config());
        runtime.add_vertex(TraceVertex::boxed("only")).set_entry("only");

        let (tx, rx) = futures::channel::mpsc::unbounded();
        let ctx = ctx().with_events(tx);
        runtime.run(TraceState::default(), &ctx).await.unwrap();
        drop(ctx);

        let events: Vec<_> = rx.collect().await;
        assert!(matches!(events.first(), Some(WorkflowEvent::SuperstepStarted { superstep: 0, .. })));
        assert!(matches!(events.last(), Some(WorkflowEvent::Completed { supersteps: 1 })));
    }

    #[tokio::test]
    async fn test_to_mermaid() {
        let mut runtime = PregelRuntime::with_config(fast_config());
        runtime
            .add_vertex(TraceVertex::boxed("plan"))
            .add_vertex(TraceVertex::boxed("review"))
            .add_edge("plan", "review")
            .add_error_edge("plan", END)
            .add_interrupt("review")
            .set_entry("plan");

        let diagram = runtime.to_mermaid();
        assert!(diagram.starts_with("graph TD\n"));
        assert!(diagram.contains("    __start__ --> plan"));
        assert!(diagram.contains("    review{{review}}"));
        assert!(diagram.contains("    plan -. \"error\" .-> __end__"));

        let paused = runtime.run(TraceState::default(), &ctx()).await.unwrap();
        let highlighted = runtime.to_mermaid_with_frontier(&paused.checkpoint.unwrap());
        assert!(highlighted.contains("    class review pending"));
    }
}
