//! Workflows phase: execution-flow pages grouped by entry-point kind.
//!
//! Routes become the `http-api` group, CLI commands the `cli` group, and
//! `main`-style functions the `core-flows` group. A repository with no
//! recognizable entry points still gets a single `core-flows` page so the
//! wiki always documents how the code runs.

use serde_json::json;

use crate::core::errors::Result;
use crate::parse::symbols::{ParsedSymbol, SymbolKind};
use crate::phases::architecture::format_key_components;
use crate::phases::{format_symbols, PhaseContext};
use crate::summary::schema::{GeneratedPage, PageType, SynthesisMap};

/// One workflow page target.
#[derive(Debug, Clone)]
pub struct WorkflowGroup {
    /// Stable key used for the page slug and note targeting
    pub key: String,
    /// Human-readable title rendered into the prompt
    pub title: String,
    /// Entry-point symbols driving these flows
    pub entry_points: Vec<ParsedSymbol>,
}

/// Group entry-point symbols into workflow page targets.
pub fn group_entry_points(symbols: &[ParsedSymbol]) -> Vec<WorkflowGroup> {
    let routes: Vec<ParsedSymbol> = symbols
        .iter()
        .filter(|s| s.kind == SymbolKind::Route)
        .cloned()
        .collect();
    let commands: Vec<ParsedSymbol> = symbols
        .iter()
        .filter(|s| s.kind == SymbolKind::CliCommand)
        .cloned()
        .collect();
    let mains: Vec<ParsedSymbol> = symbols
        .iter()
        .filter(|s| s.kind == SymbolKind::Function && s.name == "main")
        .cloned()
        .collect();

    let mut groups = Vec::new();
    if !routes.is_empty() {
        groups.push(WorkflowGroup {
            key: "http-api".to_string(),
            title: "HTTP API".to_string(),
            entry_points: routes,
        });
    }
    if !commands.is_empty() {
        groups.push(WorkflowGroup {
            key: "cli".to_string(),
            title: "Command line".to_string(),
            entry_points: commands,
        });
    }
    // Core flows always exist, carrying main functions when present.
    groups.push(WorkflowGroup {
        key: "core-flows".to_string(),
        title: "Core flows".to_string(),
        entry_points: mains,
    });
    groups
}

/// Generate the page for one workflow group.
pub async fn generate_workflow_page(
    ctx: &PhaseContext<'_>,
    map: &SynthesisMap,
    group: &WorkflowGroup,
    synthesis_hash: &str,
    corrections: String,
) -> Result<GeneratedPage> {
    let params = json!({
        "repo_name": ctx.repo.name(),
        "workflow_name": group.title,
        "project_summary": map.project_summary,
        "key_components": format_key_components(map),
        "entry_points": format_symbols(&group.entry_points),
        "language": ctx.config.generation.language,
        "corrections": corrections,
    });

    let prompt = ctx.renderer.render("workflows", &params)?;
    let (response, warnings) = ctx.checked_generate(prompt).await?;

    let mut page = GeneratedPage::new(
        response,
        PageType::Workflow,
        format!("workflows/{}.md", group.key),
        group.key.clone(),
        synthesis_hash,
    );
    page.warnings = warnings;
    Ok(page)
}
