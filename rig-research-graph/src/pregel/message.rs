//! Message types for Pregel vertex communication
//!
//! Messages are queued while routing one superstep and delivered to the
//! target vertex at the start of the next.

use serde::{Deserialize, Serialize};

use super::vertex::VertexId;

/// Message key used for fan-out payloads
pub const SPAWN_KEY: &str = "spawn";

/// Standard message types for workflow coordination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowMessage {
    /// Trigger vertex activation
    Activate,

    /// Pass data between vertices (fan-out payloads)
    Data {
        key: String,
        value: serde_json::Value,
    },
}

impl WorkflowMessage {
    /// Create a data message
    pub fn data(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self::Data {
            key: key.into(),
            value,
        }
    }

    pub fn is_activation(&self) -> bool {
        matches!(self, WorkflowMessage::Activate)
    }
}

/// Messages queued for one vertex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inbox {
    pub vertex: VertexId,
    pub messages: Vec<WorkflowMessage>,
}

impl Inbox {
    pub fn new(vertex: VertexId) -> Self {
        Self {
            vertex,
            messages: Vec::new(),
        }
    }
}

/// Ordered set of vertices scheduled for the next superstep
///
/// Insertion order is preserved so fan-in merges are deterministic.
/// Repeated activations of the same vertex collapse into one; data
/// messages accumulate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontier {
    inboxes: Vec<Inbox>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_inboxes(inboxes: Vec<Inbox>) -> Self {
        Self { inboxes }
    }

    fn inbox_mut(&mut self, vertex: &VertexId) -> &mut Inbox {
        let index = match self.inboxes.iter().position(|i| &i.vertex == vertex) {
            Some(index) => index,
            None => {
                self.inboxes.push(Inbox::new(vertex.clone()));
                self.inboxes.len() - 1
            }
        };
        &mut self.inboxes[index]
    }

    /// Schedule a vertex, ignoring duplicate activations
    pub fn activate(&mut self, vertex: &VertexId) {
        let inbox = self.inbox_mut(vertex);
        if !inbox.messages.iter().any(WorkflowMessage::is_activation) {
            inbox.messages.push(WorkflowMessage::Activate);
        }
    }

    /// Schedule a vertex with a data payload
    pub fn send(&mut self, vertex: &VertexId, message: WorkflowMessage) {
        self.inbox_mut(vertex).messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.inboxes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inboxes.len()
    }

    pub fn vertices(&self) -> Vec<VertexId> {
        self.inboxes.iter().map(|i| i.vertex.clone()).collect()
    }

    pub fn contains(&self, vertex: &VertexId) -> bool {
        self.inboxes.iter().any(|i| &i.vertex == vertex)
    }

    pub fn inboxes(&self) -> &[Inbox] {
        &self.inboxes
    }

    pub fn into_inboxes(self) -> Vec<Inbox> {
        self.inboxes
    }
}
