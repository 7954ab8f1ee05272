//! Interview sub-graph nodes
//!
//! ```text
//! ask_question ─┬─► search_web ───────┐
//!               └─► search_wikipedia ─┴─(join)─► answer_question
//!                                                   │ route_messages
//!                          ask_question ◄───────────┤
//!                                                   ▼
//!                              save_interview ─► write_section ─► END
//! ```
//!
//! Collaborator failures are recorded in the error envelope and reported as
//! `NodeOutput::Failed`; they never abort the branch.

use std::sync::Arc;

use super::config::ResearchContext;
use super::prompts::{requests, ResearchPrompts};
use super::state::{InterviewState, InterviewUpdate, SearchQuery};
use crate::envelope::record_error;
use crate::error::ResearchError;
use crate::llm::invoke_structured;
use crate::state::{buffer_string, Message};
use crate::tools::{format_encyclopedia_documents, format_web_documents, DOCUMENT_SEPARATOR};
use crate::workflow::NodeOutput;

pub const ASK_QUESTION: &str = "ask_question";
pub const SEARCH_WEB: &str = "search_web";
pub const SEARCH_WIKIPEDIA: &str = "search_wikipedia";
pub const ANSWER_QUESTION: &str = "answer_question";
pub const SAVE_INTERVIEW: &str = "save_interview";
pub const WRITE_SECTION: &str = "write_section";

fn failed(state: &InterviewState, err: ResearchError, node: &str) -> NodeOutput<InterviewUpdate> {
    NodeOutput::failed(record_error(state, &err, node))
}

/// System instruction followed by the conversation so far
fn with_instruction(instruction: impl Into<String>, history: &[Message]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(instruction));
    messages.extend_from_slice(history);
    messages
}

/// All retrieved context of the interview as one block
fn joined_context(state: &InterviewState) -> String {
    state.context.join(DOCUMENT_SEPARATOR)
}

/// Analyst asks the next question.
pub async fn ask_question(
    ctx: Arc<ResearchContext>,
    state: InterviewState,
) -> NodeOutput<InterviewUpdate> {
    let messages = with_instruction(
        ResearchPrompts::question(&state.analyst.persona()),
        &state.messages,
    );

    match ctx.llm.complete(&messages, ctx.llm_config()).await {
        Ok(response) => NodeOutput::update(InterviewUpdate::message(response.message)),
        Err(e) => failed(&state, e.into(), ASK_QUESTION),
    }
}

async fn search_query(ctx: &ResearchContext, state: &InterviewState) -> Result<SearchQuery, ResearchError> {
    let messages = with_instruction(ResearchPrompts::search(), &state.messages);
    let query: SearchQuery = invoke_structured(ctx.llm.as_ref(), &messages, ctx.llm_config()).await?;
    tracing::debug!(query = %query.search_query, analyst = %state.analyst.name, "search query");
    Ok(query)
}

/// Web retrieval; appends one context entry (empty when nothing was found).
pub async fn search_web(
    ctx: Arc<ResearchContext>,
    state: InterviewState,
) -> NodeOutput<InterviewUpdate> {
    let query = match search_query(&ctx, &state).await {
        Ok(query) => query,
        Err(e) => return failed(&state, e, SEARCH_WEB),
    };

    match ctx
        .web
        .search(&query.search_query, ctx.config.web_max_results)
        .await
    {
        Ok(docs) => NodeOutput::update(InterviewUpdate::context(format_web_documents(&docs))),
        Err(e) => failed(&state, e.into(), SEARCH_WEB),
    }
}

/// Encyclopedia retrieval; appends one context entry.
pub async fn search_wikipedia(
    ctx: Arc<ResearchContext>,
    state: InterviewState,
) -> NodeOutput<InterviewUpdate> {
    let query = match search_query(&ctx, &state).await {
        Ok(query) => query,
        Err(e) => return failed(&state, e, SEARCH_WIKIPEDIA),
    };

    match ctx
        .encyclopedia
        .search(&query.search_query, ctx.config.encyclopedia_max_docs)
        .await
    {
        Ok(docs) => {
            NodeOutput::update(InterviewUpdate::context(format_encyclopedia_documents(&docs)))
        }
        Err(e) => failed(&state, e.into(), SEARCH_WIKIPEDIA),
    }
}

/// Expert answers from the retrieved context; the answer is tagged with the expert name.
pub async fn answer_question(
    ctx: Arc<ResearchContext>,
    state: InterviewState,
) -> NodeOutput<InterviewUpdate> {
    let instruction = ResearchPrompts::answer(&state.analyst.persona(), &joined_context(&state));
    let messages = with_instruction(instruction, &state.messages);

    match ctx.llm.complete(&messages, ctx.llm_config()).await {
        Ok(response) => {
            let answer = response.message.with_name(ctx.config.expert_name.clone());
            NodeOutput::update(InterviewUpdate::message(answer))
        }
        Err(e) => failed(&state, e.into(), ANSWER_QUESTION),
    }
}

/// Flatten the conversation into the transcript.
pub async fn save_interview(state: InterviewState) -> NodeOutput<InterviewUpdate> {
    NodeOutput::update(InterviewUpdate::interview(buffer_string(&state.messages)))
}

/// Write this analyst's report section from the retrieved context.
pub async fn write_section(
    ctx: Arc<ResearchContext>,
    state: InterviewState,
) -> NodeOutput<InterviewUpdate> {
    let messages = vec![
        Message::system(ResearchPrompts::section_writer(&state.analyst.description)),
        Message::user(requests::write_section(&joined_context(&state))),
    ];

    match ctx.llm.complete(&messages, ctx.llm_config()).await {
        Ok(response) => NodeOutput::update(InterviewUpdate::section(response.message.content)),
        Err(e) => failed(&state, e.into(), WRITE_SECTION),
    }
}
