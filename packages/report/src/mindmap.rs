//! Mindmap summaries of incident reports.
//!
//! The model is asked for a markmap-style markdown outline. The raw outline
//! is kept for client-side rendering and also parsed into a node tree.

use incident_responder_ai::complete_text;
use incident_responder_ai::providers::LlmProvider;
use serde::Serialize;

use crate::ReportError;
use crate::markdown::strip_inline;

const MINDMAP_PROMPT: &str = "\
Study the given report and summarise it into a hierarchical structure that can \
be displayed as a mindmap. Be precise in selecting the data. It is not \
necessary to cover all information, cover the main topics. Return only the \
markdown, without triple backticks or inline code marks, in the following \
format:

---
markmap:
  colorFreezeLevel: 2
---

# Incident Summary

## Details

- Category: fire
- Severity: high

## Actions

- Evacuate the building
- Notify the fire department";

/// One node of a parsed mindmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MindmapNode {
    /// Node text with markdown links reduced to their label.
    pub label: String,
    /// Child nodes, in document order.
    pub children: Vec<Self>,
}

impl MindmapNode {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }
}

/// A generated mindmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mindmap {
    /// Cleaned markmap markdown.
    pub markdown: String,
    /// Parsed outline roots.
    pub nodes: Vec<MindmapNode>,
}

/// Asks the model for a mindmap summary of `report`.
///
/// # Errors
///
/// Returns [`ReportError::Ai`] if the model request fails.
pub async fn generate_mindmap(
    provider: &dyn LlmProvider,
    report: &str,
) -> Result<Mindmap, ReportError> {
    let prompt = format!("{MINDMAP_PROMPT}\n\nReport:\n{report}");
    let reply = complete_text(provider, "", &prompt, None).await?;

    let markdown = clean_markdown(&reply);
    let nodes = parse_outline(&markdown);

    log::debug!("Generated mindmap with {} root node(s)", nodes.len());

    Ok(Mindmap { markdown, nodes })
}

/// Drops code fences the model adds despite being told not to.
fn clean_markdown(reply: &str) -> String {
    reply
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn link_labels(text: &str) -> String {
    strip_inline(text).trim().to_string()
}

fn list_item(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if let Some(item) = ["- ", "* ", "+ "]
        .iter()
        .find_map(|p| trimmed.strip_prefix(p))
    {
        return Some(item);
    }
    let (number, rest) = trimmed.split_once(". ")?;
    (!number.is_empty() && number.chars().all(|c| c.is_ascii_digit())).then_some(rest)
}

/// Attaches `node` at `level`, closing every open node at that level or
/// deeper first.
fn attach(roots: &mut Vec<MindmapNode>, stack: &mut Vec<(usize, MindmapNode)>, level: usize, node: MindmapNode) {
    while stack.last().is_some_and(|(l, _)| *l >= level) {
        close_top(roots, stack);
    }
    stack.push((level, node));
}

fn close_top(roots: &mut Vec<MindmapNode>, stack: &mut Vec<(usize, MindmapNode)>) {
    if let Some((_, node)) = stack.pop() {
        match stack.last_mut() {
            Some((_, parent)) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}

/// Parses a markmap outline into a node tree.
///
/// Headings nest by their `#` count. List items nest under the nearest
/// heading, deeper for every two spaces of indentation. A leading front
/// matter block is ignored.
#[must_use]
pub fn parse_outline(markdown: &str) -> Vec<MindmapNode> {
    let mut roots = Vec::new();
    let mut stack: Vec<(usize, MindmapNode)> = Vec::new();
    let mut heading_level = 0;

    let mut lines = markdown.lines().peekable();

    // Front matter
    while lines.peek().is_some_and(|l| l.trim().is_empty()) {
        lines.next();
    }
    if lines.peek().is_some_and(|l| l.trim() == "---") {
        lines.next();
        for line in lines.by_ref() {
            if line.trim() == "---" {
                break;
            }
        }
    }

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let hashes = trimmed.chars().take_while(|&c| c == '#').count();
        if hashes > 0 && trimmed[hashes..].starts_with(' ') {
            heading_level = hashes;
            attach(
                &mut roots,
                &mut stack,
                hashes,
                MindmapNode::new(link_labels(&trimmed[hashes..])),
            );
        } else if let Some(item) = list_item(line) {
            let indent = line.len() - line.trim_start().len();
            let level = heading_level + 1 + indent / 2;
            attach(&mut roots, &mut stack, level, MindmapNode::new(link_labels(item)));
        }
    }

    while !stack.is_empty() {
        close_top(&mut roots, &mut stack);
    }

    roots
}
