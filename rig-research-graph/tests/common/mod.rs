//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use rig_research_graph::error::ModelError;
use rig_research_graph::research::ResearchContext;
use rig_research_graph::state::{Message, Role};
use rig_research_graph::testing::{context_with, ScriptedModel, StubEncyclopedia, StubWeb};
use rig_research_graph::tools::{EncyclopediaDocument, WebDocument};

pub const PANEL: &str = r#"{"analysts": [
    {"name": "Ada", "role": "Systems engineer", "affiliation": "ACME", "description": "Focus on latency"},
    {"name": "Bo", "role": "Historian", "affiliation": "Uni", "description": "Focus on history"}
]}"#;

pub const REGENERATED_PANEL: &str = r#"{"analysts": [
    {"name": "Cy", "role": "Economist", "affiliation": "Bank", "description": "Focus on cost"}
]}"#;

pub const EXPECTED_REPORT: &str = "# Title\n## Introduction\nIntro\n\n---\n\n\nBody [1]\n\n---\n\n## Conclusion\nEnd\n\n## Sources\n[1] https://example.com/rust";

pub fn system_text(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Answers every prompt of the research workflow from its instructions
pub fn respond(messages: &[Message]) -> Result<String, ModelError> {
    let system = system_text(messages);
    let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();

    let reply = if system.contains("named Perspectives") {
        if system.contains("add an economist") {
            REGENERATED_PANEL.to_string()
        } else {
            PANEL.to_string()
        }
    } else if system.contains("named SearchQuery") {
        r#"{"search_query": "rust async runtimes"}"#.to_string()
    } else if system.contains("You are an analyst tasked with interviewing") {
        "What makes this interesting?".to_string()
    } else if system.contains("You are an expert being interviewed") {
        "It is fast [1].".to_string()
    } else if system.contains("create a short, easily digestible section") {
        if system.contains("latency") {
            "## Latency memo".to_string()
        } else if system.contains("history") {
            "## History memo".to_string()
        } else {
            "## Cost memo".to_string()
        }
    } else if system.contains("creating a report on this overall topic") {
        "## Insights\nBody [1]\n## Sources\n[1] https://example.com/rust".to_string()
    } else if system.contains("finishing a report") {
        if last.contains("introduction") {
            "# Title\n## Introduction\nIntro".to_string()
        } else {
            "## Conclusion\nEnd".to_string()
        }
    } else {
        return Err(ModelError::Provider(format!("unexpected prompt: {system}")));
    };
    Ok(reply)
}

pub fn web() -> Arc<StubWeb> {
    StubWeb::with_docs(vec![WebDocument::new("https://example.com/rust", "Rust is fast")])
}

pub fn encyclopedia() -> Arc<StubEncyclopedia> {
    StubEncyclopedia::with_docs(vec![EncyclopediaDocument::new(
        "https://en.wikipedia.org/wiki/Rust",
        "Rust is a language",
    )
    .with_page("Rust (programming language)")])
}

pub struct Fixture {
    pub model: Arc<ScriptedModel>,
    pub web: Arc<StubWeb>,
    pub encyclopedia: Arc<StubEncyclopedia>,
    pub ctx: Arc<ResearchContext>,
}

pub fn fixture() -> Fixture {
    fixture_with(ScriptedModel::responder(respond), web(), encyclopedia())
}

pub fn fixture_with(
    model: Arc<ScriptedModel>,
    web: Arc<StubWeb>,
    encyclopedia: Arc<StubEncyclopedia>,
) -> Fixture {
    let ctx = context_with(model.clone(), web.clone(), encyclopedia.clone());
    Fixture {
        model,
        web,
        encyclopedia,
        ctx,
    }
}

/// Number of analyst panel generations the model received
pub fn panel_requests(model: &ScriptedModel) -> usize {
    model
        .requests()
        .iter()
        .filter(|request| system_text(request).contains("named Perspectives"))
        .count()
}
