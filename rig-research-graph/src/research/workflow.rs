//! Pre-built research workflow
//!
//! # Workflow Structure
//!
//! ```text
//! create_analysts ─► [interrupt] human_feedback
//!        ▲                   │ initiate_all_interviews
//!        └── feedback ───────┤
//!                            ▼ one branch per analyst
//!                    conduct_interview (interview sub-graph)
//!                            │
//!         ┌──────────────────┼────────────────────┐
//!         ▼                  ▼                    ▼
//!   write_report     write_introduction    write_conclusion
//!         └──────────────────┼────────────────────┘
//!                          (join)
//!                            ▼
//!                     finalize_report ─► END
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let workflow = ResearchWorkflowBuilder::new(ctx).build()?;
//!
//! let paused = workflow.invoke(ResearchGraphState::new("Rust async", 3)).await?;
//! let checkpoint = paused.checkpoint.expect("paused before human_feedback");
//! let done = workflow.resume(checkpoint, Some(ResearchGraphUpdate::feedback(None))).await?;
//! println!("{}", done.state.final_report.unwrap_or_default());
//! ```

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use super::analysts::{create_analysts, human_feedback, CREATE_ANALYSTS, HUMAN_FEEDBACK};
use super::config::ResearchContext;
use super::interview::{
    answer_question, ask_question, save_interview, search_web, search_wikipedia, write_section,
    ANSWER_QUESTION, ASK_QUESTION, SAVE_INTERVIEW, SEARCH_WEB, SEARCH_WIKIPEDIA, WRITE_SECTION,
};
use super::report::{
    finalize_report, write_conclusion, write_introduction, write_report, FINALIZE_REPORT,
    WRITE_CONCLUSION, WRITE_INTRODUCTION, WRITE_REPORT,
};
use super::routers::{initiate_all_interviews, route_messages, InterviewSeed, CONDUCT_INTERVIEW};
use super::state::{InterviewState, ResearchGraphState, ResearchGraphUpdate};
use crate::envelope::{record_error, ErrorDelta, Fault, HistoryOp};
use crate::pregel::checkpoint::Checkpointer;
use crate::pregel::error::PregelError;
use crate::pregel::state::WorkflowState;
use crate::workflow::{
    BranchMapping, CompiledWorkflow, Node, NodeOutput, SubgraphVertex, WorkflowBuildError,
    WorkflowGraph, END,
};

/// Turn a node that needs the shared context into a plain state node.
fn bind<S, F, Fut>(ctx: &Arc<ResearchContext>, node: F) -> impl Node<S> + 'static
where
    S: WorkflowState,
    F: Fn(Arc<ResearchContext>, S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = NodeOutput<S::Update>> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    move |state: S| node(Arc::clone(&ctx), state)
}

/// Seeds interview branches and folds their sections back into the report state
#[derive(Debug, Clone)]
pub struct InterviewBranches {
    max_num_turns: usize,
}

impl InterviewBranches {
    pub fn new(max_num_turns: usize) -> Self {
        Self { max_num_turns }
    }
}

impl BranchMapping<ResearchGraphState, InterviewState> for InterviewBranches {
    fn seed(&self, _parent: &ResearchGraphState, payload: &Value) -> Result<InterviewState, PregelError> {
        let seed: InterviewSeed = serde_json::from_value(payload.clone()).map_err(|e| {
            PregelError::state_error(format!("invalid interview payload: {e}"))
        })?;
        Ok(InterviewState::new(seed.analyst, seed.messages).with_max_num_turns(self.max_num_turns))
    }

    fn collect(&self, _parent: &ResearchGraphState, child: InterviewState) -> ResearchGraphUpdate {
        if !child.errors.error_history.is_empty() {
            tracing::debug!(
                analyst = %child.analyst.name,
                errors = child.errors.error_history.len(),
                "interview finished with recorded errors"
            );
        }
        let errors = ErrorDelta {
            history: child
                .errors
                .error_history
                .into_iter()
                .map(HistoryOp::Append)
                .collect(),
            ..Default::default()
        };
        ResearchGraphUpdate::sections(child.sections).with_errors(errors)
    }

    fn failed(&self, parent: &ResearchGraphState, error: &PregelError) -> ResearchGraphUpdate {
        let fault = Fault::from_error("SubgraphError", error);
        ResearchGraphUpdate::from(record_error(parent, fault, CONDUCT_INTERVIEW))
    }
}

/// Builder for the research workflow and its interview sub-graph
pub struct ResearchWorkflowBuilder {
    ctx: Arc<ResearchContext>,
    name: String,
    checkpointer: Option<Arc<dyn Checkpointer<ResearchGraphState>>>,
}

impl ResearchWorkflowBuilder {
    pub fn new(ctx: Arc<ResearchContext>) -> Self {
        Self {
            ctx,
            name: "research_assistant".to_string(),
            checkpointer: None,
        }
    }

    /// Set the workflow name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Persist interrupt checkpoints with `checkpointer`.
    pub fn checkpointer(mut self, checkpointer: Arc<dyn Checkpointer<ResearchGraphState>>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Build the interview sub-graph run once per analyst.
    pub fn build_interview_graph(&self) -> Result<CompiledWorkflow<InterviewState>, WorkflowBuildError> {
        let ctx = &self.ctx;
        let expert_name = ctx.config.expert_name.clone();

        WorkflowGraph::<InterviewState>::new()
            .name("conduct_interview")
            .config(ctx.config.interview_engine())
            .node(ASK_QUESTION, bind(ctx, ask_question))
            .node(SEARCH_WEB, bind(ctx, search_web))
            .node(SEARCH_WIKIPEDIA, bind(ctx, search_wikipedia))
            .node(ANSWER_QUESTION, bind(ctx, answer_question))
            .node(SAVE_INTERVIEW, save_interview)
            .node(WRITE_SECTION, bind(ctx, write_section))
            .entry(ASK_QUESTION)
            .edge(ASK_QUESTION, SEARCH_WEB)
            .edge(ASK_QUESTION, SEARCH_WIKIPEDIA)
            .join(&[SEARCH_WEB, SEARCH_WIKIPEDIA], ANSWER_QUESTION)
            .conditional_edges(
                ANSWER_QUESTION,
                move |state: &InterviewState| route_messages(state, &expert_name),
                &[ASK_QUESTION, SAVE_INTERVIEW],
            )
            .on_error(ASK_QUESTION, SAVE_INTERVIEW)
            .on_error(ANSWER_QUESTION, SAVE_INTERVIEW)
            .edge(SAVE_INTERVIEW, WRITE_SECTION)
            .edge(WRITE_SECTION, END)
            .compile()
    }

    /// Build the outer research graph.
    pub fn build(self) -> Result<CompiledWorkflow<ResearchGraphState>, WorkflowBuildError> {
        let interviews = SubgraphVertex::new(
            CONDUCT_INTERVIEW,
            self.build_interview_graph()?,
            InterviewBranches::new(self.ctx.config.max_num_turns),
        )
        .with_branch_timeout(self.ctx.config.interview_budget());
        let ctx = &self.ctx;

        let workflow = WorkflowGraph::<ResearchGraphState>::new()
            .name(self.name.clone())
            .config(ctx.config.engine.clone())
            .node(CREATE_ANALYSTS, bind(ctx, create_analysts))
            .node(HUMAN_FEEDBACK, human_feedback)
            .vertex(Arc::new(interviews))
            .node(WRITE_REPORT, bind(ctx, write_report))
            .node(WRITE_INTRODUCTION, bind(ctx, write_introduction))
            .node(WRITE_CONCLUSION, bind(ctx, write_conclusion))
            .node(FINALIZE_REPORT, finalize_report)
            .entry(CREATE_ANALYSTS)
            .edge(CREATE_ANALYSTS, HUMAN_FEEDBACK)
            .interrupt_before(HUMAN_FEEDBACK)
            .conditional_edges(
                HUMAN_FEEDBACK,
                initiate_all_interviews,
                &[CREATE_ANALYSTS, CONDUCT_INTERVIEW],
            )
            .edge(CONDUCT_INTERVIEW, WRITE_REPORT)
            .edge(CONDUCT_INTERVIEW, WRITE_INTRODUCTION)
            .edge(CONDUCT_INTERVIEW, WRITE_CONCLUSION)
            .join(
                &[WRITE_CONCLUSION, WRITE_REPORT, WRITE_INTRODUCTION],
                FINALIZE_REPORT,
            )
            .edge(FINALIZE_REPORT, END)
            .compile()?;

        tracing::debug!(workflow = %self.name, "research workflow compiled");
        Ok(match self.checkpointer {
            Some(checkpointer) => workflow.with_checkpointer(checkpointer),
            None => workflow,
        })
    }
}
