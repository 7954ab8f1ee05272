//! Workflow state abstraction for Pregel runtime
//!
//! The runtime collects updates from every vertex in a superstep, merges
//! them in frontier order and applies the result once.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::channel::ChannelSpec;
use super::vertex::StateUpdate;

/// Trait for workflow state managed by the Pregel runtime
///
/// # Example
///
/// ```ignore
/// impl WorkflowState for ReportState {
///     type Update = ReportUpdate;
///
///     fn apply_update(&self, update: Self::Update) -> Self {
///         let mut next = self.clone();
///         update.sections.apply_to(&mut next.sections);
///         update.title.apply_to(&mut next.title);
///         next
///     }
///
///     fn channels() -> &'static [ChannelSpec] {
///         const CHANNELS: &[ChannelSpec] =
///             &[ChannelSpec::overwrite("title"), ChannelSpec::append("sections")];
///         CHANNELS
///     }
/// }
/// ```
pub trait WorkflowState: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// The update type produced by vertices
    type Update: StateUpdate;

    /// Apply an update to produce a new state
    fn apply_update(&self, update: Self::Update) -> Self;

    /// Merge updates from one superstep, earliest first
    fn merge_updates(updates: Vec<Self::Update>) -> Self::Update {
        let mut merged = Self::Update::empty();
        for update in updates {
            merged.merge(update);
        }
        merged
    }

    /// Check if the state represents a terminal condition
    ///
    /// When true, the workflow stops regardless of pending vertices.
    fn is_terminal(&self) -> bool {
        false
    }

    /// Apply multiple updates in sequence
    fn apply_updates(&self, updates: Vec<Self::Update>) -> Self {
        if updates.is_empty() {
            return self.clone();
        }
        let merged = Self::merge_updates(updates);
        self.apply_update(merged)
    }

    /// Field channels and their merge policies
    fn channels() -> &'static [ChannelSpec] {
        &[]
    }
}

/// A simple unit state for workflows that don't need shared state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitState;

/// Unit update that has no effect
#[derive(Debug, Clone, Default)]
pub struct UnitUpdate;

impl StateUpdate for UnitUpdate {
    fn empty() -> Self {
        UnitUpdate
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn merge(&mut self, _later: Self) {}
}

impl WorkflowState for UnitState {
    type Update = UnitUpdate;

    fn apply_update(&self, _update: Self::Update) -> Self {
        UnitState
    }
}
