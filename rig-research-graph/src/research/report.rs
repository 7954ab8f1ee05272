//! Report writer nodes and final assembly

use std::sync::Arc;

use super::config::ResearchContext;
use super::prompts::{requests, ResearchPrompts};
use super::state::{ResearchGraphState, ResearchGraphUpdate};
use crate::envelope::{record_error, record_error_with, record_recovery, ErrorDelta, RecordOptions, Severity};
use crate::error::ResearchError;
use crate::state::Message;
use crate::workflow::NodeOutput;

pub const WRITE_REPORT: &str = "write_report";
pub const WRITE_INTRODUCTION: &str = "write_introduction";
pub const WRITE_CONCLUSION: &str = "write_conclusion";
pub const FINALIZE_REPORT: &str = "finalize_report";

const INSIGHTS_HEADER: &str = "## Insights";
const SOURCES_HEADER: &str = "## Sources";
const SOURCES_SPLIT: &str = "\n## Sources\n";
const PART_SEPARATOR: &str = "\n\n---\n\n";

fn joined_sections(state: &ResearchGraphState) -> String {
    state.sections.join("\n\n")
}

async fn write(
    ctx: &ResearchContext,
    state: &ResearchGraphState,
    instruction: String,
    request: &str,
    node: &str,
) -> Result<String, ErrorDelta> {
    let messages = [Message::system(instruction), Message::user(request)];
    match ctx.llm.complete(&messages, ctx.llm_config()).await {
        Ok(response) => {
            tracing::debug!(node, chars = response.message.content.len(), "writer finished");
            Ok(response.message.content)
        }
        Err(e) => Err(record_error(state, &ResearchError::from(e), node)),
    }
}

/// Main body of the report, written from all interview sections.
pub async fn write_report(
    ctx: Arc<ResearchContext>,
    state: ResearchGraphState,
) -> NodeOutput<ResearchGraphUpdate> {
    let instruction = ResearchPrompts::report_writer(&state.topic, &joined_sections(&state));
    match write(&ctx, &state, instruction, requests::WRITE_REPORT, WRITE_REPORT).await {
        Ok(text) => NodeOutput::update(ResearchGraphUpdate::content(text)),
        Err(delta) => NodeOutput::failed(delta),
    }
}

pub async fn write_introduction(
    ctx: Arc<ResearchContext>,
    state: ResearchGraphState,
) -> NodeOutput<ResearchGraphUpdate> {
    let instruction = ResearchPrompts::intro_conclusion(&state.topic, &joined_sections(&state));
    match write(&ctx, &state, instruction, requests::WRITE_INTRODUCTION, WRITE_INTRODUCTION).await {
        Ok(text) => NodeOutput::update(ResearchGraphUpdate::introduction(text)),
        Err(delta) => NodeOutput::failed(delta),
    }
}

pub async fn write_conclusion(
    ctx: Arc<ResearchContext>,
    state: ResearchGraphState,
) -> NodeOutput<ResearchGraphUpdate> {
    let instruction = ResearchPrompts::intro_conclusion(&state.topic, &joined_sections(&state));
    match write(&ctx, &state, instruction, requests::WRITE_CONCLUSION, WRITE_CONCLUSION).await {
        Ok(text) => NodeOutput::update(ResearchGraphUpdate::conclusion(text)),
        Err(delta) => NodeOutput::failed(delta),
    }
}

/// Body of the report split from its sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportParts {
    pub body: String,
    pub sources: Option<String>,
    /// The sources header was present but could not be split cleanly
    pub malformed_sources: bool,
}

impl ReportParts {
    /// Strip a leading `## Insights` header and split off the sources section.
    pub fn split(content: &str) -> Self {
        let body = content.strip_prefix(INSIGHTS_HEADER).unwrap_or(content);
        if !body.contains(SOURCES_HEADER) {
            return Self {
                body: body.to_string(),
                sources: None,
                malformed_sources: false,
            };
        }

        let parts: Vec<&str> = body.split(SOURCES_SPLIT).collect();
        match parts.as_slice() {
            [body, sources] => Self {
                body: body.to_string(),
                sources: Some(sources.to_string()),
                malformed_sources: false,
            },
            _ => Self {
                body: body.to_string(),
                sources: None,
                malformed_sources: true,
            },
        }
    }

    pub fn assemble(&self, introduction: &str, conclusion: &str) -> String {
        let mut report = format!(
            "{introduction}{PART_SEPARATOR}{}{PART_SEPARATOR}{conclusion}",
            self.body
        );
        if let Some(sources) = &self.sources {
            report.push_str("\n\n");
            report.push_str(SOURCES_HEADER);
            report.push('\n');
            report.push_str(sources);
        }
        report
    }
}

/// Stitch introduction, body and conclusion into the final report.
///
/// Never fails: a malformed sources section is dropped and missing writer
/// outputs count as empty, each recorded as a warning.
pub async fn finalize_report(state: ResearchGraphState) -> NodeOutput<ResearchGraphUpdate> {
    let mut errors = ErrorDelta::default();

    let parts = ReportParts::split(state.content.as_deref().unwrap_or_default());
    if parts.malformed_sources {
        let warning = record_error_with(
            &state,
            &ResearchError::ReportAssembly("sources section could not be split".into()),
            FINALIZE_REPORT,
            RecordOptions::default().with_severity(Severity::Warning),
        );
        let view = state.errors.with_delta(&warning);
        errors.merge(warning);
        errors.merge(record_recovery(&view, "omit_sources", true, None));
    }

    for (key, value) in [
        ("introduction", &state.introduction),
        ("content", &state.content),
        ("conclusion", &state.conclusion),
    ] {
        if value.is_none() {
            let view = state.errors.with_delta(&errors);
            errors.merge(record_error_with(
                &view,
                &ResearchError::state_shape(key),
                FINALIZE_REPORT,
                RecordOptions::default().with_severity(Severity::Warning),
            ));
        }
    }

    let report = parts.assemble(
        state.introduction.as_deref().unwrap_or_default(),
        state.conclusion.as_deref().unwrap_or_default(),
    );
    tracing::info!(chars = report.len(), sources = parts.sources.is_some(), "report finalized");

    NodeOutput::update(ResearchGraphUpdate::final_report(report).with_errors(errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pregel::WorkflowState;
    use crate::state::Role;
    use crate::testing::{context_with, ScriptedModel, StubEncyclopedia, StubWeb};
    use crate::error::ModelError;

    fn written(content: &str) -> ResearchGraphState {
        let mut state = ResearchGraphState::new("Rust", 2);
        state.introduction = Some("Intro".into());
        state.content = Some(content.into());
        state.conclusion = Some("End".into());
        state
    }

    #[tokio::test]
    async fn test_finalize_report_with_sources() {
        let state = written("## Insights\nBody\n## Sources\nSrc1");
        let next = state.apply_update(finalize_report(state.clone()).await.into_update());

        assert_eq!(
            next.final_report.as_deref(),
            Some("Intro\n\n---\n\n\nBody\n\n---\n\nEnd\n\n## Sources\nSrc1")
        );
        assert!(next.errors.error.is_none());
        assert!(next.errors.error_history.is_empty());
    }

    #[tokio::test]
    async fn test_finalize_report_without_sources() {
        let state = written("Body only");
        let next = state.apply_update(finalize_report(state.clone()).await.into_update());
        assert_eq!(next.final_report.as_deref(), Some("Intro\n\n---\n\nBody only\n\n---\n\nEnd"));
    }

    #[tokio::test]
    async fn test_finalize_report_malformed_sources() {
        let state = written("Body mentions ## Sources inline");
        let next = state.apply_update(finalize_report(state.clone()).await.into_update());

        let report = next.final_report.unwrap();
        assert_eq!(report, "Intro\n\n---\n\nBody mentions ## Sources inline\n\n---\n\nEnd");
        assert!(!report.contains("\n\n## Sources\n"));

        assert!(next.errors.error.is_none());
        let entry = &next.errors.error_history[0];
        assert_eq!(entry.error_type, "ReportAssemblyError");
        assert_eq!(entry.severity, Severity::Warning);
        assert_eq!(entry.recovered, Some(true));
        assert_eq!(entry.recovery_method.as_deref(), Some("omit_sources"));
    }

    #[tokio::test]
    async fn test_finalize_report_missing_parts() {
        let mut state = ResearchGraphState::new("Rust", 2);
        state.content = Some("Body".into());

        let output = finalize_report(state.clone()).await;
        assert!(!output.is_failed());
        let next = state.apply_update(output.into_update());

        assert_eq!(next.final_report.as_deref(), Some("\n\n---\n\nBody\n\n---\n\n"));
        let kinds: Vec<&str> = next.errors.error_history.iter().map(|e| e.error_type.as_str()).collect();
        assert_eq!(kinds, vec!["StateShapeError", "StateShapeError"]);
        assert!(next.errors.error_history.iter().all(|e| e.severity == Severity::Warning));
        assert!(next.errors.error.as_ref().unwrap().message.contains("conclusion"));
    }

    #[test]
    fn test_split_repeated_sources_marker() {
        let parts = ReportParts::split("A\n## Sources\nB\n## Sources\nC");
        assert!(parts.malformed_sources);
        assert_eq!(parts.sources, None);
        assert_eq!(parts.body, "A\n## Sources\nB\n## Sources\nC");
    }

    #[test]
    fn test_split_strips_insights_only_at_start() {
        let parts = ReportParts::split("Intro ## Insights");
        assert_eq!(parts.body, "Intro ## Insights");
    }

    #[tokio::test]
    async fn test_writers_join_sections() {
        let model = ScriptedModel::new(["Report body", "Introduction", "Conclusion"]);
        let ctx = context_with(model.clone(), StubWeb::empty(), StubEncyclopedia::empty());
        let mut state = ResearchGraphState::new("Rust", 2);
        state.sections = vec!["S1".into(), "S2".into()];

        let content = write_report(Arc::clone(&ctx), state.clone()).await.into_update();
        let intro = write_introduction(Arc::clone(&ctx), state.clone()).await.into_update();
        let outro = write_conclusion(ctx, state.clone()).await.into_update();

        let next = state.apply_updates(vec![content, intro, outro]);
        assert_eq!(next.content.as_deref(), Some("Report body"));
        assert_eq!(next.introduction.as_deref(), Some("Introduction"));
        assert_eq!(next.conclusion.as_deref(), Some("Conclusion"));

        let requests = model.requests();
        assert_eq!(requests.len(), 3);
        for request in &requests {
            assert_eq!(request[0].role, Role::System);
            assert!(request[0].content.contains("S1\n\nS2"));
        }
        assert_eq!(requests[1][1].content, "Write the report introduction");
        assert_eq!(requests[2][1].content, "Write the report conclusion");
    }

    #[tokio::test]
    async fn test_writer_failure_is_recorded() {
        let model = ScriptedModel::failing(ModelError::RateLimited("slow down".into()));
        let ctx = context_with(model, StubWeb::empty(), StubEncyclopedia::empty());
        let state = ResearchGraphState::new("Rust", 2);

        let output = write_report(ctx, state.clone()).await;
        assert!(output.is_failed());
        let next = state.apply_update(output.into_update());
        assert!(next.content.is_none());
        assert_eq!(next.errors.error.as_ref().unwrap().node, WRITE_REPORT);
    }
}
