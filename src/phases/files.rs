//! Files phase: one wiki page plus a structured summary per source file.

use serde_json::json;

use crate::core::errors::Result;
use crate::core::slug::path_to_slug;
use crate::parse::symbols::ParsedSymbol;
use crate::phases::{format_symbols, PhaseContext};
use crate::summary::block::parse_file_summary;
use crate::summary::schema::{FileSummary, GeneratedPage, PageType};

/// Inputs for a single file page.
pub struct FilePhaseInput<'a> {
    /// Repo-relative file path
    pub path: &'a str,
    /// Raw file content
    pub content: &'a str,
    /// Symbols extracted from the file
    pub symbols: &'a [ParsedSymbol],
    /// Imports from the parser or the pre-pass
    pub imports: &'a [String],
    /// File-tree rendering used as repository context
    pub file_tree: &'a str,
    /// SHA-256 of the file content
    pub content_hash: String,
    /// Joined developer corrections; empty when no notes target this file
    pub corrections: String,
}

/// Generate the wiki page and summary for one file.
pub async fn generate_file_page(
    ctx: &PhaseContext<'_>,
    input: FilePhaseInput<'_>,
) -> Result<(GeneratedPage, FileSummary)> {
    let params = json!({
        "repo_name": ctx.repo.name(),
        "file_tree": input.file_tree,
        "file_path": input.path,
        "symbols": format_symbols(input.symbols),
        "imports": if input.imports.is_empty() {
            "(none detected)".to_string()
        } else {
            input.imports.join(", ")
        },
        "content": input.content,
        "language": ctx.config.generation.language,
        "corrections": input.corrections,
    });

    let prompt = ctx.renderer.render("file", &params)?;
    let (response, warnings) = ctx.checked_generate(prompt).await?;

    let (summary, body) = parse_file_summary(input.path, &response);

    let mut page = GeneratedPage::new(
        body,
        PageType::File,
        format!("files/{}.md", path_to_slug(input.path)),
        input.path,
        input.content_hash,
    );
    page.warnings = warnings;
    if summary.purpose == "Unknown" {
        page.warnings
            .push("structured summary missing from model output; fallback applied".to_string());
    }

    Ok((page, summary))
}
