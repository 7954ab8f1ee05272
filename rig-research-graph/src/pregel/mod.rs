//! Pregel-style runtime for the research graphs
//!
//! - **Vertex**: computation unit (a node function or a sub-graph fan-out)
//! - **Edge**: direct, conditional (router), join, or error edge
//! - **Superstep**: every scheduled vertex runs concurrently, then updates
//!   are merged in frontier order and the next frontier is routed
//! - **Channel**: a state field with a merge policy
//!
//! A run ends when the frontier empties, when every scheduled vertex is an
//! interrupt target (the run pauses and checkpoints), or on an engine error.
//! Resuming a paused run skips the interrupt once and keeps counting
//! supersteps from the checkpoint.

pub mod channel;
pub mod checkpoint;
pub mod config;
pub mod edge;
pub mod error;
pub mod message;
pub mod runtime;
pub mod state;
pub mod vertex;
pub mod visualization;

pub use channel::{Append, ChannelSpec, MergePolicy, Overwrite};
pub use checkpoint::{
    create_checkpointer, Checkpoint, Checkpointer, CheckpointerConfig, FileCheckpointer,
    MemoryCheckpointer,
};
pub use config::{PregelConfig, RetryPolicy};
pub use edge::{Route, Router, Spawn, END};
pub use error::PregelError;
pub use message::{Frontier, Inbox, WorkflowMessage, SPAWN_KEY};
pub use runtime::{PregelRuntime, RunContext, RunStatus, WorkflowEvent, WorkflowResult};
pub use state::{UnitState, UnitUpdate, WorkflowState};
pub use vertex::{
    BoxedVertex, ComputeContext, ComputeResult, Outcome, StateUpdate, Vertex, VertexId, VertexKind,
};
