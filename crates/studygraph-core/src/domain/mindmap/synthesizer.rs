//! Mindmap synthesis
//!
//! Never fails: a service error or a reply that is not a mindmap diagram
//! yields [`MINDMAP_FALLBACK`], which still renders.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::knowledge::KnowledgePointRef;
use crate::llm::{GenerativeService, ResponseFormat};

/// Every valid diagram starts with this keyword
pub const DIAGRAM_PREFIX: &str = "mindmap";

/// Returned whenever synthesis fails
pub const MINDMAP_FALLBACK: &str = "mindmap\n  root((Mindmap generation failed))";

/// Whether `code` is the failure payload
pub fn is_fallback(code: &str) -> bool {
    code == MINDMAP_FALLBACK
}

/// Builds Mermaid mindmap code from a set of knowledge points
#[derive(Clone)]
pub struct MindmapSynthesizer {
    service: Arc<dyn GenerativeService>,
}

impl MindmapSynthesizer {
    pub fn new(service: Arc<dyn GenerativeService>) -> Self {
        Self { service }
    }

    /// Synthesize a mindmap rooted at `label` covering `points`.
    ///
    /// Points are reduced to distinct trimmed names; blank ones are dropped.
    /// With nothing left the diagram is built locally and holds only the root.
    pub async fn synthesize(&self, label: &str, points: &[KnowledgePointRef]) -> String {
        let label = match label.trim() {
            "" => "Knowledge points",
            l => l,
        };
        let names = normalize_points(points);

        if names.is_empty() {
            debug!(label = %label, "No knowledge points, building root-only mindmap");
            return format!("{}\n  root(({}))", DIAGRAM_PREFIX, escape_node_text(label));
        }

        let prompt = build_mindmap_prompt(label, &names);
        let response = match self.service.generate(&prompt, ResponseFormat::Text).await {
            Ok(response) => response,
            Err(e) => {
                warn!(label = %label, error = %e, "Mindmap generation failed");
                return MINDMAP_FALLBACK.to_string();
            }
        };

        let code = strip_code_fence(&response);
        if !code.starts_with(DIAGRAM_PREFIX) {
            warn!(label = %label, "Mindmap reply is not a mindmap diagram");
            return MINDMAP_FALLBACK.to_string();
        }

        debug!(label = %label, points = names.len(), "Mindmap synthesized");
        code.to_string()
    }
}

/// Distinct display names in first-seen order
pub fn normalize_points(points: &[KnowledgePointRef]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(points.len());
    for point in points {
        if let Some(name) = point.display_name()
            && !names.iter().any(|n| n == name)
        {
            names.push(name.to_string());
        }
    }
    names
}

/// Remove a surrounding ``` fence (with or without a language tag)
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Mermaid treats brackets as node shape delimiters
fn escape_node_text(text: &str) -> String {
    text.replace(['(', ')', '[', ']', '{', '}'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_mindmap_prompt(label: &str, names: &[String]) -> String {
    let list = names
        .iter()
        .map(|n| format!("- {}", n))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"Create a Mermaid mindmap that organizes the following knowledge points.
The root node is "{label}". Group related points under intermediate topics where it helps.
Reply with the diagram code only, starting with the line "mindmap".
Do not use parentheses or brackets inside node text.

KNOWLEDGE POINTS:
{list}"#
    )
}
