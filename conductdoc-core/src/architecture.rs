//! Deterministic Mermaid summary of a repository's shape.
//!
//! Built only from counts and module names, never from synthesized text, so
//! it is always valid and always identical for the same inputs.

use crate::model::Module;

/// Module names shown beneath the module count node.
const HIGHLIGHTED_MODULES: usize = 3;

/// Keeps characters Mermaid accepts inside a `[label]` unquoted.
pub fn sanitize_label(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect()
}

/// Mermaid `graph TD` source fenced as a markdown code block.
pub fn architecture_diagram(repo_name: &str, modules: &[Module]) -> String {
    let total_symbols: usize = modules.iter().map(|m| m.symbols.len()).sum();
    let repo_label = match sanitize_label(repo_name) {
        label if label.trim().is_empty() => "Repository".to_string(),
        label => label,
    };

    let mut lines = vec![
        "```mermaid".to_string(),
        "graph TD".to_string(),
        format!("    A[{repo_label}] --> B[Core Modules]"),
        "    A --> C[Python Files]".to_string(),
        "    B --> D[Classes & Functions]".to_string(),
        format!("    C --> E[{} Modules]", modules.len()),
        format!("    D --> F[{total_symbols} Symbols]"),
    ];

    let highlighted = modules
        .iter()
        .take(HIGHLIGHTED_MODULES)
        .filter(|m| !m.symbols.is_empty())
        .filter_map(|m| {
            let last = m.module_name.rsplit('.').next().unwrap_or(&m.module_name);
            Some(sanitize_label(last)).filter(|label| !label.is_empty())
        });
    for (node, label) in ('G'..).zip(highlighted) {
        lines.push(format!("    E --> {node}[{label}]"));
    }

    lines.push("```".to_string());
    lines.join("\n")
}

/// Strips the markdown fence, leaving bare Mermaid source for an HTML `<div class="mermaid">`.
pub fn strip_fence(diagram: &str) -> &str {
    diagram
        .trim()
        .strip_prefix("```mermaid")
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(diagram)
}
