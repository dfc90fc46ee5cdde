//! Directories phase: one wiki page plus a structured summary per directory.

use serde_json::json;

use crate::core::errors::Result;
use crate::core::slug::{path_to_slug, ROOT_SLUG};
use crate::phases::{format_file_summaries, PhaseContext};
use crate::summary::block::parse_directory_summary;
use crate::summary::schema::{DirectorySummary, FileSummary, GeneratedPage, PageType};

/// Inputs for a single directory page.
pub struct DirectoryPhaseInput<'a> {
    /// Repo-relative directory path; empty string for the repository root
    pub path: &'a str,
    /// Direct child file names
    pub contains: Vec<String>,
    /// Summaries of the direct child files
    pub file_summaries: Vec<&'a FileSummary>,
    /// Directory signature hash
    pub signature: String,
    /// Joined developer corrections; empty when no notes target this
    /// directory
    pub corrections: String,
}

/// Slug for a directory path, mapping the root to `root`.
pub fn directory_slug(path: &str) -> String {
    if path.is_empty() {
        ROOT_SLUG.to_string()
    } else {
        path_to_slug(path)
    }
}

/// Generate the wiki page and summary for one directory.
pub async fn generate_directory_page(
    ctx: &PhaseContext<'_>,
    input: DirectoryPhaseInput<'_>,
) -> Result<(GeneratedPage, DirectorySummary)> {
    let display_path = if input.path.is_empty() {
        "(repository root)"
    } else {
        input.path
    };

    let params = json!({
        "repo_name": ctx.repo.name(),
        "directory_path": display_path,
        "contains": if input.contains.is_empty() {
            "(no direct files)".to_string()
        } else {
            input.contains.join("\n")
        },
        "file_summaries": format_file_summaries(&input.file_summaries),
        "language": ctx.config.generation.language,
        "corrections": input.corrections,
    });

    let prompt = ctx.renderer.render("directory", &params)?;
    let (response, warnings) = ctx.checked_generate(prompt).await?;

    let (summary, body) = parse_directory_summary(input.path, &input.contains, &response);

    let mut page = GeneratedPage::new(
        body,
        PageType::Directory,
        format!("directories/{}.md", directory_slug(input.path)),
        input.path,
        input.signature,
    );
    page.warnings = warnings;
    if summary.purpose == "Unknown" {
        page.warnings
            .push("structured summary missing from model output; fallback applied".to_string());
    }

    Ok((page, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::OyaConfig;
    use crate::core::repository::Repository;
    use crate::llm::MockLlmClient;
    use crate::prompt::renderer::PromptRenderer;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    const RESPONSE: &str = "\
---
purpose: Application source code.
role_in_system: Hosts every runtime module.
contains: [a.py, b.py]
---
# src

Directory documentation.";

    #[tokio::test]
    async fn test_generate_directory_page() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        let config = OyaConfig::default();
        let renderer = PromptRenderer::new("English", config.firewall.clone()).unwrap();
        let llm = MockLlmClient::new().with_default_response(RESPONSE);
        let ctx = PhaseContext {
            repo: &repo,
            config: &config,
            llm: &llm,
            renderer: &renderer,
            cancel: CancellationToken::new(),
        };

        let input = DirectoryPhaseInput {
            path: "src",
            contains: vec!["a.py".to_string(), "b.py".to_string()],
            file_summaries: vec![],
            signature: "sig-1".to_string(),
            corrections: String::new(),
        };

        let (page, summary) = generate_directory_page(&ctx, input).await.unwrap();
        assert_eq!(page.path, "directories/src.md");
        assert_eq!(page.target, "src");
        assert_eq!(page.source_hash, "sig-1");
        assert_eq!(summary.purpose, "Application source code.");
        assert_eq!(summary.contains, vec!["a.py", "b.py"]);
    }

    #[test]
    fn test_root_directory_slug() {
        assert_eq!(directory_slug(""), "root");
        assert_eq!(directory_slug("src/server"), "src-server");
    }
}
