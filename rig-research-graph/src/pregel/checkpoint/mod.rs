//! Checkpointing for the Pregel runtime
//!
//! A checkpoint captures everything needed to continue a run at a superstep
//! boundary: the state, the ordered frontier with its pending messages, and
//! partial join progress. Checkpoints are written when a run pauses at an
//! interrupt and, optionally, every `checkpoint_interval` supersteps.
//!
//! ```ignore
//! let checkpointer = create_checkpointer::<ResearchGraphState>(
//!     CheckpointerConfig::File { path: "./checkpoints".into(), compression: true },
//!     "run-42",
//! );
//! let graph = graph.with_checkpointer(checkpointer);
//! ```

mod file;

pub use file::FileCheckpointer;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use super::error::PregelError;
use super::message::Frontier;
use super::state::WorkflowState;
use super::vertex::VertexId;

/// Snapshot of a run at a superstep boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Checkpoint<S>
where
    S: WorkflowState,
{
    /// Resume refuses checkpoints whose id differs from the workflow's
    pub workflow_id: String,

    /// Supersteps completed so far; resume continues counting from here
    pub superstep: usize,

    pub state: S,

    /// Vertices scheduled for the next superstep, with their messages
    pub frontier: Frontier,

    /// Completed sources per join edge, indexed by declaration order
    #[serde(default)]
    pub join_progress: Vec<Vec<VertexId>>,

    /// Interrupt vertices that paused the run (empty for periodic checkpoints)
    #[serde(default)]
    pub interrupted_before: Vec<VertexId>,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl<S> Checkpoint<S>
where
    S: WorkflowState,
{
    pub fn new(
        workflow_id: impl Into<String>,
        superstep: usize,
        state: S,
        frontier: Frontier,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            superstep,
            state,
            frontier,
            join_progress: Vec::new(),
            interrupted_before: Vec::new(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_join_progress(mut self, progress: Vec<Vec<VertexId>>) -> Self {
        self.join_progress = progress;
        self
    }

    pub fn with_interrupt(mut self, before: Vec<VertexId>) -> Self {
        self.interrupted_before = before;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// True when the run paused before a human-in-the-loop vertex
    pub fn is_interrupt(&self) -> bool {
        !self.interrupted_before.is_empty()
    }

    pub fn pending_message_count(&self) -> usize {
        self.frontier.inboxes().iter().map(|i| i.messages.len()).sum()
    }
}

/// Storage for one workflow's checkpoints, keyed by superstep
#[async_trait]
pub trait Checkpointer<S>: Send + Sync
where
    S: WorkflowState,
{
    /// Overwrites any checkpoint at the same superstep.
    async fn save(&self, checkpoint: &Checkpoint<S>) -> Result<(), PregelError>;

    async fn load(&self, superstep: usize) -> Result<Option<Checkpoint<S>>, PregelError>;

    async fn latest(&self) -> Result<Option<Checkpoint<S>>, PregelError>;

    /// Stored supersteps, ascending
    async fn list(&self) -> Result<Vec<usize>, PregelError>;

    async fn delete(&self, superstep: usize) -> Result<(), PregelError>;

    /// Drop all but the newest `keep`; returns the number dropped
    async fn prune(&self, keep: usize) -> Result<usize, PregelError> {
        let stored = self.list().await?;
        let excess = stored.len().saturating_sub(keep);
        for superstep in &stored[..excess] {
            self.delete(*superstep).await?;
        }
        Ok(excess)
    }

    async fn clear(&self) -> Result<(), PregelError> {
        for superstep in self.list().await? {
            self.delete(superstep).await?;
        }
        Ok(())
    }
}

/// Selects a checkpoint backend
#[derive(Debug, Clone, Default)]
pub enum CheckpointerConfig {
    #[default]
    Memory,

    /// One JSON file per checkpoint under `path/<workflow_id>/`
    File {
        path: PathBuf,
        /// Compress with zstd
        compression: bool,
    },
}

/// Process-local checkpoints; gone when the process exits
#[derive(Debug)]
pub struct MemoryCheckpointer<S>
where
    S: WorkflowState,
{
    checkpoints: tokio::sync::RwLock<BTreeMap<usize, Checkpoint<S>>>,
}

impl<S> Default for MemoryCheckpointer<S>
where
    S: WorkflowState,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> MemoryCheckpointer<S>
where
    S: WorkflowState,
{
    pub fn new() -> Self {
        Self {
            checkpoints: tokio::sync::RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl<S> Checkpointer<S> for MemoryCheckpointer<S>
where
    S: WorkflowState,
{
    async fn save(&self, checkpoint: &Checkpoint<S>) -> Result<(), PregelError> {
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.superstep, checkpoint.clone());
        Ok(())
    }

    async fn load(&self, superstep: usize) -> Result<Option<Checkpoint<S>>, PregelError> {
        Ok(self.checkpoints.read().await.get(&superstep).cloned())
    }

    async fn latest(&self) -> Result<Option<Checkpoint<S>>, PregelError> {
        Ok(self
            .checkpoints
            .read()
            .await
            .last_key_value()
            .map(|(_, checkpoint)| checkpoint.clone()))
    }

    async fn list(&self) -> Result<Vec<usize>, PregelError> {
        Ok(self.checkpoints.read().await.keys().copied().collect())
    }

    async fn delete(&self, superstep: usize) -> Result<(), PregelError> {
        self.checkpoints.write().await.remove(&superstep);
        Ok(())
    }
}

/// Backend for `workflow_id`; the id only matters for file storage
pub fn create_checkpointer<S>(
    config: CheckpointerConfig,
    workflow_id: impl AsRef<str>,
) -> Arc<dyn Checkpointer<S>>
where
    S: WorkflowState,
{
    match config {
        CheckpointerConfig::Memory => Arc::new(MemoryCheckpointer::<S>::new()),
        CheckpointerConfig::File { path, compression } => {
            Arc::new(FileCheckpointer::new(path, workflow_id, compression))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pregel::state::UnitState;

    fn frontier_of(names: &[&str]) -> Frontier {
        let mut frontier = Frontier::new();
        for name in names {
            frontier.activate(&VertexId::from(*name));
        }
        frontier
    }

    fn checkpoint(superstep: usize) -> Checkpoint<UnitState> {
        Checkpoint::new("wf", superstep, UnitState, Frontier::new())
    }

    #[test]
    fn test_checkpoint_creation() {
        let cp = Checkpoint::new("wf-1", 3, UnitState, frontier_of(&["human_feedback"]));
        assert_eq!(cp.workflow_id, "wf-1");
        assert_eq!(cp.superstep, 3);
        assert_eq!(cp.pending_message_count(), 1);
        assert!(!cp.is_interrupt());
    }

    #[test]
    fn test_checkpoint_interrupt_and_metadata() {
        let cp = checkpoint(1)
            .with_interrupt(vec![VertexId::from("human_feedback")])
            .with_join_progress(vec![vec![VertexId::from("write_report")]])
            .with_metadata("topic", "agents");

        assert!(cp.is_interrupt());
        assert_eq!(cp.join_progress[0].len(), 1);
        assert_eq!(cp.metadata.get("topic"), Some(&"agents".to_string()));
    }

    #[test]
    fn test_checkpoint_serde_preserves_frontier_order() {
        let cp = Checkpoint::new("wf", 2, UnitState, frontier_of(&["b", "a", "c"]));
        let json = serde_json::to_string(&cp).unwrap();
        let back: Checkpoint<UnitState> = serde_json::from_str(&json).unwrap();

        let names: Vec<_> = back.frontier.vertices().into_iter().map(|v| v.0).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_memory_checkpointer_save_load() {
        let checkpointer = MemoryCheckpointer::new();
        checkpointer.save(&checkpoint(5)).await.unwrap();

        let loaded = checkpointer.load(5).await.unwrap().unwrap();
        assert_eq!(loaded.superstep, 5);
        assert!(checkpointer.load(6).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_checkpointer_latest() {
        let checkpointer = MemoryCheckpointer::new();
        assert!(checkpointer.latest().await.unwrap().is_none());

        for superstep in [1, 5, 3] {
            checkpointer.save(&checkpoint(superstep)).await.unwrap();
        }

        assert_eq!(checkpointer.latest().await.unwrap().unwrap().superstep, 5);
    }

    #[tokio::test]
    async fn test_memory_checkpointer_prune_and_clear() {
        let checkpointer = MemoryCheckpointer::new();
        for superstep in 1..=5 {
            checkpointer.save(&checkpoint(superstep)).await.unwrap();
        }

        assert_eq!(checkpointer.prune(2).await.unwrap(), 3);
        assert_eq!(checkpointer.list().await.unwrap(), vec![4, 5]);

        checkpointer.clear().await.unwrap();
        assert!(checkpointer.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_checkpointer_memory() {
        let checkpointer = create_checkpointer::<UnitState>(CheckpointerConfig::default(), "wf");
        checkpointer.save(&checkpoint(1)).await.unwrap();
        assert_eq!(checkpointer.list().await.unwrap(), vec![1]);
    }
}
