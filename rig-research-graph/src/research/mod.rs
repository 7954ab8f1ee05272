//! Multi-analyst research workflow
//!
//! An analyst panel is generated for a topic and reviewed by a human. Each
//! approved analyst then interviews an expert backed by web and encyclopedia
//! retrieval, writes one memo-style section, and the sections are combined
//! into a report with an introduction and a conclusion.
//!
//! ```ignore
//! use rig_research_graph::research::{ResearchContext, ResearchGraphState, ResearchWorkflowBuilder};
//!
//! let ctx = Arc::new(ResearchContext::new(llm, web, encyclopedia));
//! let workflow = ResearchWorkflowBuilder::new(ctx).build()?;
//! let paused = workflow.invoke(ResearchGraphState::new("Context engineering", 3)).await?;
//! ```

pub mod analysts;
pub mod config;
pub mod interview;
pub mod prompts;
pub mod report;
pub mod routers;
pub mod state;
pub mod workflow;

pub use analysts::{create_analysts, human_feedback, CREATE_ANALYSTS, HUMAN_FEEDBACK};
pub use config::{ResearchConfig, ResearchContext};
pub use interview::{
    answer_question, ask_question, save_interview, search_web, search_wikipedia, write_section,
};
pub use prompts::ResearchPrompts;
pub use report::{
    finalize_report, write_conclusion, write_introduction, write_report, ReportParts,
    FINALIZE_REPORT,
};
pub use routers::{initiate_all_interviews, route_messages, InterviewSeed, CONDUCT_INTERVIEW};
pub use state::{
    Analyst, InterviewState, InterviewUpdate, Perspectives, ResearchGraphState,
    ResearchGraphUpdate, SearchQuery, DEFAULT_MAX_NUM_TURNS,
};
pub use workflow::{InterviewBranches, ResearchWorkflowBuilder};
