//! Engine limits and retry behavior
//!
//! One interview sub-graph runs inside a single vertex of the research
//! graph, so `vertex_timeout` bounds a whole interview, not one model call.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::PregelError;

/// Limits applied to every run of a compiled workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PregelConfig {
    /// A run that reaches this many supersteps fails with `MaxSuperstepsExceeded`
    pub max_supersteps: usize,

    /// Vertices computed concurrently within one superstep
    pub parallelism: usize,

    /// Save a checkpoint every N supersteps; 0 saves only at interrupts
    pub checkpoint_interval: usize,

    #[serde(with = "humantime_serde")]
    pub vertex_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub workflow_timeout: Duration,

    /// Log the scheduled vertices of each superstep
    pub tracing_enabled: bool,

    /// Applies to vertices that return a recoverable engine error
    pub retry_policy: RetryPolicy,
}

impl Default for PregelConfig {
    fn default() -> Self {
        Self {
            max_supersteps: 100,
            parallelism: num_cpus::get(),
            checkpoint_interval: 0,
            vertex_timeout: Duration::from_secs(300),
            workflow_timeout: Duration::from_secs(3600),
            tracing_enabled: true,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl PregelConfig {
    pub fn with_max_supersteps(mut self, max: usize) -> Self {
        self.max_supersteps = max;
        self
    }

    /// At least one vertex always runs.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn with_vertex_timeout(mut self, timeout: Duration) -> Self {
        self.vertex_timeout = timeout;
        self
    }

    pub fn with_workflow_timeout(mut self, timeout: Duration) -> Self {
        self.workflow_timeout = timeout;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing_enabled = enabled;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn checkpointing_enabled(&self) -> bool {
        self.checkpoint_interval > 0
    }

    /// Whether a periodic checkpoint is due after `superstep`
    pub fn should_checkpoint(&self, superstep: usize) -> bool {
        self.checkpointing_enabled() && superstep > 0 && superstep % self.checkpoint_interval == 0
    }

    /// Reject limits no run could satisfy.
    pub fn validate(&self) -> Result<(), PregelError> {
        if self.max_supersteps == 0 {
            return Err(PregelError::config_error("max_supersteps must be at least 1"));
        }
        if self.vertex_timeout.is_zero() || self.workflow_timeout.is_zero() {
            return Err(PregelError::config_error("timeouts must be non-zero"));
        }
        if self.vertex_timeout > self.workflow_timeout {
            return Err(PregelError::config_error(format!(
                "vertex_timeout ({:?}) exceeds workflow_timeout ({:?})",
                self.vertex_timeout, self.workflow_timeout
            )));
        }
        Ok(())
    }
}

/// Exponential backoff: `backoff_base * 2^attempt`, capped at `backoff_max`
///
/// Shared by the runtime (recoverable vertex errors) and `RetryingProvider`
/// (transient model errors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,

    #[serde(with = "humantime_serde")]
    pub backoff_base: Duration,

    #[serde(with = "humantime_serde")]
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn no_retry() -> Self {
        Self::new(0)
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_backoff_max(mut self, max: Duration) -> Self {
        self.backoff_max = max;
        self
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31) as u32);
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }

    /// `attempts` counts the retries already made.
    pub fn should_retry(&self, attempts: usize) -> bool {
        attempts < self.max_retries
    }
}
