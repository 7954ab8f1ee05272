//! WorkflowGraph builder DSL.
//!
//! Declares nodes, edges, joins, routers, error edges and interrupts, then
//! validates the declaration and compiles it into a runnable workflow.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::pregel::edge::{Router, END};
use crate::pregel::runtime::PregelRuntime;
use crate::pregel::vertex::{BoxedVertex, VertexId};
use crate::pregel::{PregelConfig, WorkflowState};
use crate::workflow::compiled::CompiledWorkflow;
use crate::workflow::node::{Node, NodeVertex};

/// Errors that can occur while building a workflow graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowBuildError {
    #[error("workflow entry point not set")]
    NoEntryPoint,
    #[error("unknown node id: {0}")]
    UnknownNode(String),
    #[error("node declared twice: {0}")]
    DuplicateNode(String),
    #[error("join into '{0}' has no sources")]
    EmptyJoin(String),
    #[error("'{0}' is reserved and cannot name a node")]
    ReservedName(String),
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

struct ConditionalDecl<S> {
    from: String,
    router: Arc<dyn Router<S>>,
    targets: Vec<String>,
}

/// Builder for constructing workflow graphs with fluent API.
pub struct WorkflowGraph<S: WorkflowState> {
    name: String,
    config: PregelConfig,
    vertices: Vec<BoxedVertex<S>>,
    edges: Vec<(String, String)>,
    conditional: Vec<ConditionalDecl<S>>,
    joins: Vec<(Vec<String>, String)>,
    error_edges: Vec<(String, String)>,
    interrupts: Vec<String>,
    entry_point: Option<String>,
}

impl<S: WorkflowState> Default for WorkflowGraph<S> {
    fn default() -> Self {
        Self {
            name: String::new(),
            config: PregelConfig::default(),
            vertices: Vec::new(),
            edges: Vec::new(),
            conditional: Vec::new(),
            joins: Vec::new(),
            error_edges: Vec::new(),
            interrupts: Vec::new(),
            entry_point: None,
        }
    }
}

impl<S: WorkflowState> WorkflowGraph<S> {
    /// Create a new workflow graph builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the workflow name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Runtime configuration used by the compiled workflow
    pub fn config(mut self, config: PregelConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a node function.
    pub fn node(self, id: impl Into<String>, node: impl Node<S> + 'static) -> Self {
        let id = id.into();
        let vertex = NodeVertex::new(id, Arc::new(node));
        self.vertex(Arc::new(vertex))
    }

    /// Add a custom vertex (e.g. a sub-graph fan-out).
    pub fn vertex(mut self, vertex: BoxedVertex<S>) -> Self {
        self.vertices.push(vertex);
        self
    }

    /// Set the entry point node.
    pub fn entry(mut self, id: impl Into<String>) -> Self {
        self.entry_point = Some(id.into());
        self
    }

    /// Add a direct edge between nodes.
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Route from `from` with `router`, which may only choose among `targets` or `END`.
    pub fn conditional_edges(
        mut self,
        from: impl Into<String>,
        router: impl Router<S> + 'static,
        targets: &[&str],
    ) -> Self {
        self.conditional.push(ConditionalDecl {
            from: from.into(),
            router: Arc::new(router),
            targets: targets.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    /// Activate `to` only after every source has completed.
    pub fn join(mut self, sources: &[&str], to: impl Into<String>) -> Self {
        self.joins
            .push((sources.iter().map(|s| s.to_string()).collect(), to.into()));
        self
    }

    /// Take `to` instead of the normal edges when `from` reports a failure.
    pub fn on_error(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.error_edges.push((from.into(), to.into()));
        self
    }

    /// Pause the run before `id` executes.
    pub fn interrupt_before(mut self, id: impl Into<String>) -> Self {
        self.interrupts.push(id.into());
        self
    }

    /// Validate and compile the workflow graph.
    pub fn compile(self) -> Result<CompiledWorkflow<S>, WorkflowBuildError> {
        self.config
            .validate()
            .map_err(|e| WorkflowBuildError::InvalidConfig(e.to_string()))?;
        let mut names = HashSet::new();
        for vertex in &self.vertices {
            let id = vertex.id().as_str().to_string();
            if id == END {
                return Err(WorkflowBuildError::ReservedName(id));
            }
            if !names.insert(id.clone()) {
                return Err(WorkflowBuildError::DuplicateNode(id));
            }
        }

        let known = |id: &str| -> Result<(), WorkflowBuildError> {
            if names.contains(id) {
                Ok(())
            } else {
                Err(WorkflowBuildError::UnknownNode(id.to_string()))
            }
        };
        let known_or_end = |id: &str| if id == END { Ok(()) } else { known(id) };

        let entry_point = self.entry_point.ok_or(WorkflowBuildError::NoEntryPoint)?;
        known(&entry_point)?;

        for (from, to) in self.edges.iter().chain(self.error_edges.iter()) {
            known(from)?;
            known_or_end(to)?;
        }
        for decl in &self.conditional {
            known(&decl.from)?;
            for target in &decl.targets {
                known_or_end(target)?;
            }
        }
        for (sources, to) in &self.joins {
            if sources.is_empty() {
                return Err(WorkflowBuildError::EmptyJoin(to.clone()));
            }
            for source in sources {
                known(source)?;
            }
            known(to)?;
        }
        for id in &self.interrupts {
            known(id)?;
        }

        let mut runtime = PregelRuntime::with_config(self.config);
        for vertex in self.vertices {
            runtime.add_vertex(vertex);
        }
        for (from, to) in self.edges {
            runtime.add_edge(from, to);
        }
        for decl in self.conditional {
            let targets = decl.targets.into_iter().map(VertexId::from).collect();
            runtime.add_conditional_edge(decl.from, decl.router, targets);
        }
        for (sources, to) in self.joins {
            runtime.add_join(sources.into_iter().map(VertexId::from).collect(), to);
        }
        for (from, to) in self.error_edges {
            runtime.add_error_edge(from, to);
        }
        for id in self.interrupts {
            runtime.add_interrupt(id);
        }
        runtime.set_entry(entry_point);

        Ok(CompiledWorkflow::new(self.name, runtime))
    }
}
