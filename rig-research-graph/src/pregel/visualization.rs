//! Mermaid diagram generation for Pregel workflows
//!
//! The entry points are `PregelRuntime::to_mermaid` and
//! `PregelRuntime::to_mermaid_with_frontier`; this module holds the
//! rendering helpers.
//!
//! | Vertex            | Shape       | Mermaid Syntax |
//! |-------------------|-------------|----------------|
//! | Task              | Rectangle   | `id[label]`    |
//! | Subgraph          | Subroutine  | `id[[label]]`  |
//! | Interrupt target  | Hexagon     | `id{{label}}`  |
//! | START/END         | Stadium     | `id([label])`  |
//!
//! | Edge        | Mermaid Syntax        |
//! |-------------|-----------------------|
//! | Direct      | `a --> b`             |
//! | Conditional | `a -.-> b`            |
//! | Join        | `a ==> b`             |
//! | Error       | `a -. "error" .-> b`  |

use super::channel::ChannelSpec;
use super::edge::END;
use super::vertex::{VertexId, VertexKind};

/// Mermaid id of the synthetic start node
pub const START_ID: &str = "__start__";
/// Mermaid id of the synthetic end node
pub const END_ID: &str = "__end__";

/// Sanitize a vertex ID for use as a Mermaid node identifier.
///
/// Mermaid node IDs must be alphanumeric (plus underscores).
pub fn sanitize_id(id: &str) -> String {
    if id == END {
        return END_ID.to_string();
    }
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Render a node declaration with the shape for its kind
pub fn render_node(id: &VertexId, kind: VertexKind, interrupt: bool) -> String {
    let safe_id = sanitize_id(id.as_str());
    let label = id.as_str();

    if interrupt {
        return format!("    {}{{{{{}}}}}", safe_id, label);
    }
    match kind {
        VertexKind::Task => format!("    {}[{}]", safe_id, label),
        VertexKind::Subgraph => format!("    {}[[{}]]", safe_id, label),
    }
}

/// Render the synthetic START and END nodes
pub fn render_terminals() -> [String; 2] {
    [
        format!("    {}([START])", START_ID),
        format!("    {}([END])", END_ID),
    ]
}

/// Style of an edge in the rendered graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStyle {
    Direct,
    Conditional,
    Join,
    Error,
}

/// Render an edge between two node ids (already sanitized or raw)
pub fn render_edge(from: &str, to: &str, style: EdgeStyle) -> String {
    let from_safe = sanitize_id(from);
    let to_safe = sanitize_id(to);

    match style {
        EdgeStyle::Direct => format!("    {} --> {}", from_safe, to_safe),
        EdgeStyle::Conditional => format!("    {} -.-> {}", from_safe, to_safe),
        EdgeStyle::Join => format!("    {} ==> {}", from_safe, to_safe),
        EdgeStyle::Error => format!("    {} -. \"error\" .-> {}", from_safe, to_safe),
    }
}

/// Comment line listing state channels and their merge policies
pub fn render_channels(channels: &[ChannelSpec]) -> Option<String> {
    if channels.is_empty() {
        return None;
    }
    let listed: Vec<String> = channels
        .iter()
        .map(|c| format!("{}={}", c.name, c.policy.as_str()))
        .collect();
    Some(format!("    %% channels: {}", listed.join(", ")))
}

/// Class applied to vertices pending in a checkpoint frontier
pub fn mark_pending(id: &VertexId) -> String {
    format!("    class {} pending", sanitize_id(id.as_str()))
}

/// CSS class definitions for pending vertices
pub const STYLE_DEFS: &str = "    classDef pending fill:#FFE4B5,stroke:#FF8C00,stroke-width:2px\n";
