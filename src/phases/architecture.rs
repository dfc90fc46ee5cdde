//! Architecture phase: a single page derived from the synthesis map.

use serde_json::json;

use crate::core::errors::Result;
use crate::phases::PhaseContext;
use crate::summary::schema::{GeneratedPage, PageType, SynthesisMap};

/// Render the layer grouping as prompt context.
pub(crate) fn format_layers(map: &SynthesisMap) -> String {
    map.layers
        .iter()
        .map(|(name, info)| {
            format!(
                "- {name}: {} ({} files, {} directories)",
                info.purpose,
                info.files.len(),
                info.directories.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render key components as prompt context.
pub(crate) fn format_key_components(map: &SynthesisMap) -> String {
    if map.key_components.is_empty() {
        return "(none identified)".to_string();
    }
    map.key_components
        .iter()
        .map(|c| format!("- {} ({}): {} [{}]", c.name, c.file, c.role, c.layer))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_dependency_graph(map: &SynthesisMap) -> String {
    if map.dependency_graph.is_empty() {
        return "(none reported)".to_string();
    }
    map.dependency_graph
        .iter()
        .map(|(layer, deps)| format!("- {layer} -> {}", deps.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generate the architecture page from the synthesis map.
pub async fn generate_architecture_page(
    ctx: &PhaseContext<'_>,
    map: &SynthesisMap,
    synthesis_hash: &str,
) -> Result<GeneratedPage> {
    let params = json!({
        "repo_name": ctx.repo.name(),
        "project_summary": map.project_summary,
        "layers": format_layers(map),
        "key_components": format_key_components(map),
        "dependency_graph": format_dependency_graph(map),
        "language": ctx.config.generation.language,
        "corrections": "",
    });

    let prompt = ctx.renderer.render("architecture", &params)?;
    let (response, warnings) = ctx.checked_generate(prompt).await?;

    let mut page = GeneratedPage::new(
        response,
        PageType::Architecture,
        "architecture.md",
        "",
        synthesis_hash,
    );
    page.warnings = warnings;
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::OyaConfig;
    use crate::core::repository::Repository;
    use crate::llm::MockLlmClient;
    use crate::prompt::renderer::PromptRenderer;
    use crate::summary::schema::{KeyComponent, LayerInfo};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn sample_map() -> SynthesisMap {
        let mut map = SynthesisMap::default();
        map.layers.insert(
            "api".to_string(),
            LayerInfo {
                purpose: "surface".to_string(),
                files: vec!["src/a.py".to_string()],
                directories: vec!["src".to_string()],
            },
        );
        map.key_components.push(KeyComponent {
            name: "Router".to_string(),
            file: "src/a.py".to_string(),
            role: "dispatch".to_string(),
            layer: "api".to_string(),
        });
        map.dependency_graph
            .insert("api".to_string(), vec!["domain".to_string()]);
        map.project_summary = "A demo.".to_string();
        map
    }

    #[tokio::test]
    async fn test_generate_architecture_page() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        let config = OyaConfig::default();
        let renderer = PromptRenderer::new("English", config.firewall.clone()).unwrap();
        let llm = MockLlmClient::new().with_default_response("# Architecture\n\nLayered.");
        let ctx = PhaseContext {
            repo: &repo,
            config: &config,
            llm: &llm,
            renderer: &renderer,
            cancel: CancellationToken::new(),
        };

        let page = generate_architecture_page(&ctx, &sample_map(), "synth-hash")
            .await
            .unwrap();
        assert_eq!(page.path, "architecture.md");
        assert_eq!(page.page_type, PageType::Architecture);
        assert_eq!(page.source_hash, "synth-hash");
        assert_eq!(page.target, "");

        let prompts = llm.prompts();
        assert!(prompts[0].contains("Router"));
        assert!(prompts[0].contains("api -> domain"));
    }
}
