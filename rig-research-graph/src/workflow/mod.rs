//! Workflow graph DSL on top of the Pregel runtime
//!
//! - [`WorkflowGraph`]: fluent builder for nodes, edges, joins, routers,
//!   error edges and interrupts
//! - [`CompiledWorkflow`]: validated graph with invoke/stream/resume
//! - [`SubgraphVertex`]: fan-out of a child workflow, one run per branch

pub mod compiled;
pub mod graph;
pub mod node;
pub mod subgraph;

pub use compiled::{CompiledWorkflow, WorkflowStream};
pub use graph::{WorkflowBuildError, WorkflowGraph};
pub use node::{Node, NodeOutput, NodeVertex};
pub use subgraph::{BranchMapping, SubgraphVertex};
pub use crate::pregel::edge::{Route, Router, Spawn, END};
