//! Synthesis map construction.
//!
//! Layer grouping is computed algorithmically and never fails; the model
//! only contributes key components, the dependency graph, and the project
//! summary. When the estimated token footprint of all summaries exceeds the
//! context limit, summaries are packed into batches in input order and the
//! per-batch maps are merged deterministically.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::core::config::OyaConfig;
use crate::core::errors::Result;
use crate::core::repository::Repository;
use crate::core::tokens::estimate_tokens;
use crate::llm::{generate_with_retry, GenerationRequest, LlmClient};
use crate::prompt::renderer::PromptRenderer;
use crate::summary::schema::{
    DirectorySummary, FileSummary, KeyComponent, Layer, LayerInfo, SynthesisMap,
};

/// Token reserve for template scaffolding around the batched summaries.
const SCAFFOLD_RESERVE: usize = 2_000;

/// Upper bound on key components accepted per batch.
const MAX_KEY_COMPONENTS: usize = 15;

#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    #[serde(default)]
    key_components: Vec<KeyComponent>,
    #[serde(default)]
    dependency_graph: IndexMap<String, Vec<String>>,
    #[serde(default)]
    project_summary: String,
}

/// One summary queued for batching, pre-rendered with its token estimate.
struct SummaryItem<'a> {
    line: String,
    tokens: usize,
    file: Option<&'a FileSummary>,
    directory: Option<&'a DirectorySummary>,
}

/// Builds the synthesis map from file and directory summaries.
pub struct SynthesisBuilder<'a> {
    repo: &'a Repository,
    config: &'a OyaConfig,
    llm: &'a dyn LlmClient,
    renderer: &'a PromptRenderer,
    cancel: CancellationToken,
}

impl<'a> SynthesisBuilder<'a> {
    /// Create a builder over the run's shared services.
    pub fn new(
        repo: &'a Repository,
        config: &'a OyaConfig,
        llm: &'a dyn LlmClient,
        renderer: &'a PromptRenderer,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            repo,
            config,
            llm,
            renderer,
            cancel,
        }
    }

    /// Build the synthesis map. The layer grouping always succeeds; an LLM
    /// failure in any batch keeps that batch's algorithmic grouping and is
    /// logged, never silent.
    pub async fn build(
        &self,
        file_summaries: &[FileSummary],
        directory_summaries: &[DirectorySummary],
    ) -> Result<SynthesisMap> {
        let items = collect_items(file_summaries, directory_summaries);
        let budget = self
            .config
            .generation
            .context_limit
            .saturating_sub(SCAFFOLD_RESERVE);

        let total: usize = items.iter().map(|item| item.tokens).sum();
        let batches = if total <= budget {
            vec![items]
        } else {
            pack_batches(items, budget)
        };
        debug!(batches = batches.len(), total_tokens = total, "synthesis batching");

        let mut partial_maps = Vec::with_capacity(batches.len());
        for (index, batch) in batches.iter().enumerate() {
            let files: Vec<&FileSummary> = batch.iter().filter_map(|i| i.file).collect();
            let dirs: Vec<&DirectorySummary> = batch.iter().filter_map(|i| i.directory).collect();
            let layers = compute_layers(&files, &dirs);

            let mut map = SynthesisMap {
                layers,
                ..Default::default()
            };

            match self.query_batch(batch, &map).await {
                Ok(response) => {
                    let mut components = response.key_components;
                    components.truncate(MAX_KEY_COMPONENTS);
                    map.key_components = components;
                    map.dependency_graph = response.dependency_graph;
                    map.project_summary = response.project_summary;
                }
                Err(err) if matches!(err, crate::core::errors::OyaError::Cancelled) => {
                    return Err(err);
                }
                Err(err) => {
                    error!(
                        batch = index,
                        error = %err,
                        "synthesis batch failed; keeping algorithmic layer grouping"
                    );
                }
            }
            partial_maps.push(map);
        }

        Ok(merge_maps(partial_maps))
    }

    async fn query_batch(
        &self,
        batch: &[SummaryItem<'_>],
        map: &SynthesisMap,
    ) -> Result<SynthesisResponse> {
        let file_text: Vec<&str> = batch
            .iter()
            .filter(|i| i.file.is_some())
            .map(|i| i.line.as_str())
            .collect();
        let dir_text: Vec<&str> = batch
            .iter()
            .filter(|i| i.directory.is_some())
            .map(|i| i.line.as_str())
            .collect();

        let layers_text = map
            .layers
            .iter()
            .map(|(name, info)| format!("- {name}: {} files", info.files.len()))
            .collect::<Vec<_>>()
            .join("\n");

        let params = json!({
            "repo_name": self.repo.name(),
            "layers": layers_text,
            "file_summaries": file_text.join("\n"),
            "directory_summaries": dir_text.join("\n"),
            "language": self.config.generation.language,
        });

        let prompt = self.renderer.render("synthesis", &params)?;
        let request = GenerationRequest::new(prompt.text, self.config.llm.temperature);
        let response = generate_with_retry(
            self.llm,
            &request,
            self.config.generation.max_retries,
            &self.cancel,
        )
        .await?;

        let cleaned = strip_code_fences(&response);
        let parsed: SynthesisResponse = serde_json::from_str(cleaned)?;
        Ok(parsed)
    }
}

/// Compute the deterministic layer grouping. Each file contributes to
/// exactly one layer; a layer appears iff at least one file classifies into
/// it. A directory is listed under every layer its direct files occupy.
pub fn compute_layers(
    files: &[&FileSummary],
    directories: &[&DirectorySummary],
) -> IndexMap<String, LayerInfo> {
    let mut layers: IndexMap<String, LayerInfo> = IndexMap::new();

    for layer in Layer::ALL {
        let members: Vec<&&FileSummary> =
            files.iter().filter(|f| f.layer == layer).collect();
        if members.is_empty() {
            continue;
        }

        let mut info = LayerInfo {
            purpose: layer.purpose().to_string(),
            ..Default::default()
        };
        for file in &members {
            info.files.push(file.file_path.clone());
            let parent = parent_dir(&file.file_path);
            if !info.directories.contains(&parent) {
                info.directories.push(parent);
            }
        }
        layers.insert(layer.as_str().to_string(), info);
    }

    // Directories with no summarized files still belong somewhere; anchor
    // them to the layer of any of their direct children.
    for dir in directories {
        let member = layers
            .iter()
            .any(|(_, info)| info.directories.contains(&dir.directory_path));
        if !member {
            if let Some((_, info)) = layers.iter_mut().next() {
                info.directories.push(dir.directory_path.clone());
            }
        }
    }

    layers
}

/// Parent directory of a repo-relative path; empty string for root files.
fn parent_dir(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

/// Merge per-batch synthesis maps.
///
/// Layers union their files and directories (deduplicated by path), key
/// components keep the first occurrence by name, dependency edges union per
/// layer, and the longest non-empty project summary wins. `merge([])` is the
/// empty map and `merge([x])` is `x`.
pub fn merge_maps(maps: Vec<SynthesisMap>) -> SynthesisMap {
    let mut merged = SynthesisMap::default();

    for map in maps {
        for (name, info) in map.layers {
            let entry = merged.layers.entry(name).or_insert_with(|| LayerInfo {
                purpose: info.purpose.clone(),
                ..Default::default()
            });
            if entry.purpose.is_empty() {
                entry.purpose = info.purpose;
            }
            for file in info.files {
                if !entry.files.contains(&file) {
                    entry.files.push(file);
                }
            }
            for dir in info.directories {
                if !entry.directories.contains(&dir) {
                    entry.directories.push(dir);
                }
            }
        }

        for component in map.key_components {
            if !merged
                .key_components
                .iter()
                .any(|existing| existing.name == component.name)
            {
                merged.key_components.push(component);
            }
        }

        for (layer, deps) in map.dependency_graph {
            let entry = merged.dependency_graph.entry(layer).or_default();
            for dep in deps {
                if !entry.contains(&dep) {
                    entry.push(dep);
                }
            }
        }

        if map.project_summary.len() > merged.project_summary.len() {
            merged.project_summary = map.project_summary;
        }
    }

    merged
}

fn collect_items<'a>(
    file_summaries: &'a [FileSummary],
    directory_summaries: &'a [DirectorySummary],
) -> Vec<SummaryItem<'a>> {
    let mut items = Vec::with_capacity(file_summaries.len() + directory_summaries.len());
    for summary in file_summaries {
        let line = format!(
            "- file {} [{}]: {} (abstractions: {}; internal: {}; external: {})",
            summary.file_path,
            summary.layer,
            summary.purpose,
            summary.key_abstractions.join(", "),
            summary.internal_deps.join(", "),
            summary.external_deps.join(", "),
        );
        items.push(SummaryItem {
            tokens: estimate_tokens(&line),
            line,
            file: Some(summary),
            directory: None,
        });
    }
    for summary in directory_summaries {
        let line = format!(
            "- directory {}: {} (role: {})",
            if summary.directory_path.is_empty() {
                "(root)"
            } else {
                &summary.directory_path
            },
            summary.purpose,
            summary.role_in_system,
        );
        items.push(SummaryItem {
            tokens: estimate_tokens(&line),
            line,
            file: None,
            directory: Some(summary),
        });
    }
    items
}

/// Pack items into batches whose token estimates stay within `budget`,
/// preserving input order. Every batch holds at least one item.
fn pack_batches(items: Vec<SummaryItem<'_>>, budget: usize) -> Vec<Vec<SummaryItem<'_>>> {
    let mut batches = Vec::new();
    let mut current: Vec<SummaryItem<'_>> = Vec::new();
    let mut current_tokens = 0usize;

    for item in items {
        if !current.is_empty() && current_tokens + item.tokens > budget {
            batches.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current_tokens += item.tokens;
        current.push(item);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Strip a surrounding markdown code fence from a model response.
fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    if let Some(inner) = trimmed.strip_prefix("```") {
        let inner = inner.strip_prefix("json").unwrap_or(inner);
        let inner = inner.trim_start_matches('\n');
        if let Some(end) = inner.rfind("```") {
            return inner[..end].trim();
        }
    }
    trimmed
}
