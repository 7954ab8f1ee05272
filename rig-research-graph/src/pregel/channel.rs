//! Typed state channels
//!
//! Every field of a workflow state is a channel with a merge policy that
//! decides how concurrent writes from the same superstep combine:
//!
//! | Policy      | Merge                                    |
//! |-------------|------------------------------------------|
//! | `Overwrite` | Last writer in frontier order wins       |
//! | `Append`    | Writes concatenate in frontier order     |
//! | `ErrorLog`  | Error envelope delta (see `envelope`)    |
//!
//! Update structs are built from `Overwrite<T>` and `Append<T>` fields so a
//! node can only write a field with the semantics its channel declares.

use serde::{Deserialize, Serialize};

/// How writes to a channel combine within a superstep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    Overwrite,
    Append,
    ErrorLog,
}

impl MergePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergePolicy::Overwrite => "overwrite",
            MergePolicy::Append => "append",
            MergePolicy::ErrorLog => "error_log",
        }
    }
}

/// Static description of one state field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: &'static str,
    pub policy: MergePolicy,
}

impl ChannelSpec {
    pub const fn overwrite(name: &'static str) -> Self {
        Self { name, policy: MergePolicy::Overwrite }
    }

    pub const fn append(name: &'static str) -> Self {
        Self { name, policy: MergePolicy::Append }
    }

    pub const fn error_log(name: &'static str) -> Self {
        Self { name, policy: MergePolicy::ErrorLog }
    }
}

/// A pending write to an overwrite channel
///
/// `Overwrite::unset()` leaves the field untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Overwrite<T>(Option<T>);

impl<T> Default for Overwrite<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> Overwrite<T> {
    pub fn new(value: T) -> Self {
        Self(Some(value))
    }

    pub fn unset() -> Self {
        Self(None)
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    /// Combine with a later write; the later one wins when set
    pub fn merge(&mut self, later: Overwrite<T>) {
        if later.0.is_some() {
            self.0 = later.0;
        }
    }

    pub fn apply_to(self, target: &mut T) {
        if let Some(value) = self.0 {
            *target = value;
        }
    }

    /// Apply to an optional field, setting it to `Some(value)`
    pub fn apply_some(self, target: &mut Option<T>) {
        if let Some(value) = self.0 {
            *target = Some(value);
        }
    }
}

impl<T> From<T> for Overwrite<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

/// A pending write to an append channel
#[derive(Debug, Clone, PartialEq)]
pub struct Append<T>(Vec<T>);

impl<T> Default for Append<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Append<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self(items)
    }

    pub fn one(item: T) -> Self {
        Self(vec![item])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.0
    }

    pub fn merge(&mut self, later: Append<T>) {
        self.0.extend(later.0);
    }

    pub fn apply_to(self, target: &mut Vec<T>) {
        target.extend(self.0);
    }
}
