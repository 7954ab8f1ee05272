//! rig-research-graph: multi-analyst research workflows on a Pregel-style engine
//!
//! - `pregel`: superstep runtime with typed channels, joins, interrupts and checkpoints
//! - `workflow`: graph builder, compiled workflows and sub-graph fan-out
//! - `envelope`: the error envelope every node records failures into
//! - `llm` / `tools`: model and retrieval collaborators (Rig, Tavily, Wikipedia)
//! - `research`: the analyst / interview / report graphs
//!
//! # Example
//!
//! ```rust,ignore
//! use rig::providers::openai::Client;
//! use rig::client::{CompletionClient, ProviderClient};
//! use rig_research_graph::{RigModel, TavilySearch, WikipediaSearch};
//! use rig_research_graph::research::{ResearchContext, ResearchGraphState, ResearchWorkflowBuilder};
//!
//! let client = Client::from_env();
//! let model = RigModel::new(client.agent("gpt-4.1").build());
//! let ctx = Arc::new(ResearchContext::new(
//!     Arc::new(model),
//!     Arc::new(TavilySearch::from_env()?),
//!     Arc::new(WikipediaSearch::new()),
//! ));
//!
//! let workflow = ResearchWorkflowBuilder::new(ctx).build()?;
//! let paused = workflow.invoke(ResearchGraphState::new("Rust async runtimes", 3)).await?;
//! ```

pub mod envelope;
pub mod error;
pub mod llm;
pub mod pregel;
pub mod research;
pub mod state;
pub mod testing;
pub mod tools;
pub mod workflow;

pub use envelope::{
    clear_error, get_error_severity, is_error_state, record_error, record_error_with,
    record_recovery, ErrorDelta, ErrorFields, ErrorInfo, ErrorState, RecordOptions, RecoveryInfo,
    Severity,
};
pub use error::{ModelError, ResearchError, RetrievalError};
pub use state::{buffer_string, Message, Role};

pub use llm::{
    invoke_structured, LLMConfig, LLMProvider, LLMResponse, RetryingProvider, RigModel,
    StructuredOutput, TokenUsage,
};
pub use tools::{
    EncyclopediaDocument, EncyclopediaSearch, TavilySearch, WebDocument, WebSearch,
    WikipediaSearch,
};

pub use pregel::{
    Checkpoint, Checkpointer, FileCheckpointer, MemoryCheckpointer, PregelConfig, RetryPolicy,
    RunStatus, WorkflowEvent, WorkflowResult,
};
pub use workflow::{CompiledWorkflow, NodeOutput, Route, Spawn, WorkflowGraph, END};

pub use research::{
    ResearchConfig, ResearchContext, ResearchGraphState, ResearchGraphUpdate,
    ResearchWorkflowBuilder,
};
