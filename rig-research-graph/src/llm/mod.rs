//! Model-invocation layer
//!
//! Provider-agnostic interface used by the research nodes, bridged to Rig's
//! completion providers.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     research nodes / invoke_structured  │
//! └─────────────────┬───────────────────────┘
//!                   │ uses
//!                   ▼
//! ┌─────────────────────────────────────────┐
//! │        LLMProvider (trait)              │
//! │  - complete(messages, config)           │
//! └─────────────────┬───────────────────────┘
//!                   │ implemented by
//!          ┌────────┴────────┐
//!          ▼                 ▼
//! ┌─────────────────┐ ┌─────────────────┐
//! │ RetryingProvider│ │    RigModel     │
//! │  (decorator)    │ │ (any Rig agent) │
//! └─────────────────┘ └─────────────────┘
//! ```

mod config;
mod provider;
mod retry;
mod rig_model;
mod structured;

pub use config::{LLMConfig, TokenUsage};
pub use provider::{LLMProvider, LLMResponse};
pub use retry::RetryingProvider;
pub use rig_model::RigModel;
pub use structured::{invoke_structured, parse_structured, StructuredOutput};
