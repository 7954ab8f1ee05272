//! Error envelope: a uniform record for failures inside workflow nodes
//!
//! Nodes do not return `Err` for collaborator failures. They build an
//! [`ErrorDelta`] with the helpers in this module and hand it back as part of
//! their state update. The engine merges it like any other field:
//!
//! ```text
//!   record_error ──► ErrorDelta { error: Some(info), history: [Append(info)] }
//!   clear_error  ──► ErrorDelta { history: [MarkLast(recovered)] }
//!   record_recovery ─► ErrorDelta { error: Some(None)?, history: [MarkLast(..)],
//!                                   recovery_info: Some(..) }
//! ```
//!
//! `error_history` is append-only. Recovery marks always target the entry that
//! is last at the time the delta is applied, so deltas from one superstep are
//! applied in schedule order.
//!
//! All helpers read their input state and never modify it. The only side
//! effect is a `tracing` event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::backtrace::{Backtrace, BacktraceStatus};
use tracing::{error, info, warn};

use crate::error::ResearchError;

/// Severity of a recorded error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    #[default]
    Error,
    Critical,
}

/// A single recorded failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub error_type: String,
    pub message: String,
    /// Name of the node that recorded the error
    pub node: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub recovery_attempted: bool,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_details: Option<Value>,
}

/// Metadata describing the latest recovery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryInfo {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub success: bool,
    #[serde(default)]
    pub details: Option<Value>,
    /// Type of the error that was current when recovery was recorded
    #[serde(default)]
    pub error_type: Option<String>,
    /// Node of the error that was current when recovery was recorded
    #[serde(default)]
    pub error_node: Option<String>,
}

/// Error-tracking fields embedded (flattened) in every workflow state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorFields {
    /// Most recent unresolved error
    #[serde(default)]
    pub error: Option<ErrorInfo>,
    #[serde(default)]
    pub error_history: Vec<ErrorInfo>,
    #[serde(default)]
    pub recovery_info: Option<RecoveryInfo>,
}

impl ErrorFields {
    /// View of these fields after `delta` has been applied
    ///
    /// Lets a node chain helpers (record, then recover) within one update.
    pub fn with_delta(&self, delta: &ErrorDelta) -> ErrorFields {
        let mut view = self.clone();
        delta.clone().apply(&mut view);
        view
    }
}

/// Recovery fields written onto the last history entry
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryMark {
    pub recovered: bool,
    pub timestamp: DateTime<Utc>,
    pub method: Option<String>,
    pub details: Option<Value>,
}

/// One operation on the append-only error log
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryOp {
    Append(ErrorInfo),
    MarkLast(RecoveryMark),
}

/// Partial update for the error-tracking fields
///
/// `error` distinguishes "leave unchanged" (`None`) from "set to null"
/// (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorDelta {
    pub error: Option<Option<ErrorInfo>>,
    pub history: Vec<HistoryOp>,
    pub recovery_info: Option<RecoveryInfo>,
}

impl ErrorDelta {
    pub fn is_empty(&self) -> bool {
        self.error.is_none() && self.history.is_empty() && self.recovery_info.is_none()
    }

    /// Fold a later delta into this one (later writes win, history concatenates)
    pub fn merge(&mut self, later: ErrorDelta) {
        if later.error.is_some() {
            self.error = later.error;
        }
        self.history.extend(later.history);
        if later.recovery_info.is_some() {
            self.recovery_info = later.recovery_info;
        }
    }

    /// Apply this delta to the error-tracking fields
    pub fn apply(self, target: &mut ErrorFields) {
        if let Some(error) = self.error {
            target.error = error;
        }
        for op in self.history {
            match op {
                HistoryOp::Append(info) => target.error_history.push(info),
                HistoryOp::MarkLast(mark) => {
                    if let Some(last) = target.error_history.last_mut() {
                        last.recovery_attempted = true;
                        last.recovered = Some(mark.recovered);
                        last.recovery_timestamp = Some(mark.timestamp);
                        if mark.method.is_some() {
                            last.recovery_method = mark.method;
                        }
                        if mark.details.is_some() {
                            last.recovery_details = mark.details;
                        }
                    }
                }
            }
        }
        if let Some(recovery) = self.recovery_info {
            target.recovery_info = Some(recovery);
        }
    }
}

/// States that carry the error-tracking fields
pub trait ErrorState {
    fn errors(&self) -> &ErrorFields;

    /// Names of the state's fields, used as default error context
    fn state_keys(&self) -> Vec<String>;
}

impl ErrorState for ErrorFields {
    fn errors(&self) -> &ErrorFields {
        self
    }

    fn state_keys(&self) -> Vec<String> {
        vec!["error".into(), "error_history".into(), "recovery_info".into()]
    }
}

/// What went wrong: an error object or a plain message
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    Error {
        error_type: String,
        message: String,
        stack_trace: Option<String>,
    },
    Message(String),
}

impl Fault {
    /// Capture an error object with its source chain and, when enabled via
    /// `RUST_BACKTRACE`, the current backtrace.
    pub fn from_error(error_type: impl Into<String>, err: &(dyn std::error::Error + 'static)) -> Self {
        let error_type = error_type.into();
        let mut trace = format!("{}: {}", error_type, err);
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push_str(&format!("\ncaused by: {}", cause));
            source = cause.source();
        }
        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            trace.push_str(&format!("\n{}", backtrace));
        }
        Fault::Error {
            error_type,
            message: err.to_string(),
            stack_trace: Some(trace),
        }
    }
}

impl From<&ResearchError> for Fault {
    fn from(err: &ResearchError) -> Self {
        Fault::from_error(err.kind(), err)
    }
}

impl From<ResearchError> for Fault {
    fn from(err: ResearchError) -> Self {
        Fault::from(&err)
    }
}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Fault::Message(message.to_string())
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Fault::Message(message)
    }
}

/// Options for [`record_error_with`]
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub severity: Severity,
    pub context: Option<Map<String, Value>>,
    pub add_to_history: bool,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            severity: Severity::Error,
            context: None,
            add_to_history: true,
        }
    }
}

impl RecordOptions {
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn without_history(mut self) -> Self {
        self.add_to_history = false;
        self
    }
}

/// Record an error with default options (severity `error`, added to history)
pub fn record_error<S: ErrorState + ?Sized>(state: &S, fault: impl Into<Fault>, node: &str) -> ErrorDelta {
    record_error_with(state, fault, node, RecordOptions::default())
}

/// Record an error and return the delta that stores it
pub fn record_error_with<S: ErrorState + ?Sized>(
    state: &S,
    fault: impl Into<Fault>,
    node: &str,
    options: RecordOptions,
) -> ErrorDelta {
    let (error_type, message, stack_trace) = match fault.into() {
        Fault::Error {
            error_type,
            message,
            stack_trace,
        } => (error_type, message, stack_trace),
        Fault::Message(message) => ("CustomError".to_string(), message, None),
    };

    let context = options.context.unwrap_or_else(|| {
        let keys = state.state_keys().into_iter().map(Value::String).collect();
        let mut context = Map::new();
        context.insert("state_keys".into(), Value::Array(keys));
        context
    });

    let info = ErrorInfo {
        error_type,
        message,
        node: node.to_string(),
        timestamp: Utc::now(),
        severity: options.severity,
        recovery_attempted: false,
        context,
        stack_trace,
        recovered: None,
        recovery_method: None,
        recovery_timestamp: None,
        recovery_details: None,
    };

    match info.severity {
        Severity::Warning => warn!(
            node = %info.node,
            error_type = %info.error_type,
            "{}", info.message
        ),
        Severity::Error => error!(
            node = %info.node,
            error_type = %info.error_type,
            "{}", info.message
        ),
        Severity::Critical => error!(
            node = %info.node,
            error_type = %info.error_type,
            critical = true,
            "{}", info.message
        ),
    }

    let history = if options.add_to_history {
        vec![HistoryOp::Append(info.clone())]
    } else {
        Vec::new()
    };

    ErrorDelta {
        error: Some(Some(info)),
        history,
        recovery_info: None,
    }
}

/// Mark the last history entry as recovered. Leaves `error` untouched.
pub fn clear_error<S: ErrorState + ?Sized>(state: &S, mark_recovered: bool) -> ErrorDelta {
    if !mark_recovered || state.errors().error_history.is_empty() {
        return ErrorDelta::default();
    }
    ErrorDelta {
        history: vec![HistoryOp::MarkLast(RecoveryMark {
            recovered: true,
            timestamp: Utc::now(),
            method: None,
            details: None,
        })],
        ..Default::default()
    }
}

/// True when an unresolved error is present
pub fn is_error_state<S: ErrorState + ?Sized>(state: &S) -> bool {
    state.errors().error.is_some()
}

pub fn get_error_severity<S: ErrorState + ?Sized>(state: &S) -> Option<Severity> {
    state.errors().error.as_ref().map(|e| e.severity)
}

/// Record a recovery attempt; clears `error` only when `success` is true
pub fn record_recovery<S: ErrorState + ?Sized>(
    state: &S,
    method: &str,
    success: bool,
    details: Option<Value>,
) -> ErrorDelta {
    let errors = state.errors();
    let now = Utc::now();

    let recovery = RecoveryInfo {
        timestamp: now,
        method: method.to_string(),
        success,
        details: details.clone(),
        error_type: errors.error.as_ref().map(|e| e.error_type.clone()),
        error_node: errors.error.as_ref().map(|e| e.node.clone()),
    };

    info!(method, success, error_type = ?recovery.error_type, "Recovery recorded");

    let history = if errors.error_history.is_empty() {
        Vec::new()
    } else {
        vec![HistoryOp::MarkLast(RecoveryMark {
            recovered: success,
            timestamp: now,
            method: Some(method.to_string()),
            details,
        })]
    };

    ErrorDelta {
        error: if success { Some(None) } else { None },
        history,
        recovery_info: Some(recovery),
    }
}
