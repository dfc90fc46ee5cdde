//! Overview phase: the wiki landing page.

use serde_json::json;

use crate::core::errors::Result;
use crate::phases::architecture::format_key_components;
use crate::phases::PhaseContext;
use crate::summary::schema::{GeneratedPage, PageType, SynthesisMap};

/// Generate the overview page. General-scope notes are injected here as
/// corrections since they apply to the project as a whole.
pub async fn generate_overview_page(
    ctx: &PhaseContext<'_>,
    map: &SynthesisMap,
    file_tree: &str,
    synthesis_hash: &str,
    corrections: String,
) -> Result<GeneratedPage> {
    let params = json!({
        "repo_name": ctx.repo.name(),
        "branch": ctx.repo.branch,
        "head_revision": ctx.repo.head_revision,
        "head_message": ctx.repo.head_message,
        "project_summary": map.project_summary,
        "file_tree": file_tree,
        "key_components": format_key_components(map),
        "language": ctx.config.generation.language,
        "corrections": corrections,
    });

    let prompt = ctx.renderer.render("overview", &params)?;
    let (response, warnings) = ctx.checked_generate(prompt).await?;

    let mut page = GeneratedPage::new(
        response,
        PageType::Overview,
        "overview.md",
        "",
        synthesis_hash,
    );
    page.warnings = warnings;
    Ok(page)
}
