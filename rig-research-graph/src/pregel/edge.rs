//! Edges between vertices
//!
//! Besides plain edges the runtime knows three routing forms: conditional
//! edges evaluated on the merged state, joins that wait for every source,
//! and error edges taken when a vertex reports a failed outcome.

use serde_json::Value;
use std::sync::Arc;

use super::vertex::VertexId;

/// Reserved target name that terminates a path
pub const END: &str = "END";

/// One fan-out branch: run `target` once with `payload`
#[derive(Debug, Clone, PartialEq)]
pub struct Spawn {
    pub target: String,
    pub payload: Value,
}

impl Spawn {
    pub fn new(target: impl Into<String>, payload: Value) -> Self {
        Self {
            target: target.into(),
            payload,
        }
    }
}

/// Decision returned by a router
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Activate the named vertices (or `END`)
    To(Vec<String>),
    /// Dispatch one branch per entry; an empty list activates nothing
    Spawn(Vec<Spawn>),
}

impl Route {
    /// Route to a single vertex
    pub fn to(target: impl Into<String>) -> Self {
        Route::To(vec![target.into()])
    }

    pub fn end() -> Self {
        Route::to(END)
    }

    /// Names this decision targets, in order
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Route::To(names) => names.iter().map(String::as_str).collect(),
            Route::Spawn(spawns) => spawns.iter().map(|s| s.target.as_str()).collect(),
        }
    }
}

/// Routing function attached to a conditional edge
///
/// Routers are pure: they only read the merged state of the superstep in
/// which their source vertex ran.
pub trait Router<S>: Send + Sync {
    fn route(&self, state: &S) -> Route;
}

impl<S, F> Router<S> for F
where
    F: Fn(&S) -> Route + Send + Sync,
{
    fn route(&self, state: &S) -> Route {
        self(state)
    }
}

/// A conditional edge and the targets it may choose
pub struct ConditionalEdge<S> {
    pub router: Arc<dyn Router<S>>,
    pub targets: Vec<VertexId>,
}

impl<S> Clone for ConditionalEdge<S> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            targets: self.targets.clone(),
        }
    }
}

/// Activates `target` once every source has completed
#[derive(Debug, Clone, PartialEq)]
pub struct JoinEdge {
    pub sources: Vec<VertexId>,
    pub target: VertexId,
}
