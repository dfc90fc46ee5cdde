//! Index population from the finished wiki page set.
//!
//! Both indexes are cleared and rebuilt so renames and deletions leave no
//! stale entries. Per-page failures are warned and skipped; the final index
//! is best-effort. Embedding provenance is persisted afterwards so the Q&A
//! engine can warn on model mismatch.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::errors::{OyaError, Result};
use crate::index::fts::FtsIndex;
use crate::index::vector::VectorStore;
use crate::llm::retry::embed_with_retry;
use crate::llm::LlmClient;
use crate::orchestrator::progress::PhaseTracker;
use crate::summary::schema::PageType;

/// Character cap on the text sent to the embedding provider per page.
const EMBED_MAX_CHARS: usize = 8_000;

/// Embedding provenance persisted next to the indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    /// Provider name
    pub provider: String,
    /// Embedding model name
    pub model: String,
    /// When indexing finished
    pub indexed_at: DateTime<Utc>,
}

impl EmbeddingMetadata {
    /// Read the metadata file, treating absence or corruption as `None`.
    pub fn read(path: &Path) -> Option<Self> {
        let raw = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Write the metadata file.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OyaError::io("Failed to create meta directory", e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| OyaError::storage(format!("metadata serialization failed: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| OyaError::io("Failed to write embedding metadata", e))
    }
}

/// Outcome of an indexing pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexStats {
    /// Pages written to both indexes
    pub indexed: usize,
    /// Pages skipped after an indexing error
    pub failed: usize,
}

/// Populates the vector store and lexical index from wiki pages.
pub struct Indexer<'a> {
    vector: &'a VectorStore,
    fts: &'a FtsIndex,
    llm: &'a dyn LlmClient,
    max_retries: u32,
}

impl<'a> Indexer<'a> {
    /// Create an indexer over the two index backends.
    pub fn new(
        vector: &'a VectorStore,
        fts: &'a FtsIndex,
        llm: &'a dyn LlmClient,
        max_retries: u32,
    ) -> Self {
        Self {
            vector,
            fts,
            llm,
            max_retries,
        }
    }

    /// Clear and rebuild both indexes from the pages under `wiki_dir`.
    pub async fn index_wiki(
        &self,
        wiki_dir: &Path,
        cancel: &CancellationToken,
        tracker: &mut PhaseTracker,
    ) -> Result<IndexStats> {
        self.vector.clear()?;
        self.fts.clear()?;

        let pages = collect_pages(wiki_dir);
        let mut stats = IndexStats::default();

        for (step, relative) in pages.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(OyaError::Cancelled);
            }

            match self.index_page(wiki_dir, relative, cancel).await {
                Ok(()) => stats.indexed += 1,
                Err(OyaError::Cancelled) => return Err(OyaError::Cancelled),
                Err(err) => {
                    warn!(page = %relative, error = %err, "indexing failed for page, skipping");
                    stats.failed += 1;
                }
            }
            tracker.step(step + 1, format!("indexed {relative}"));
        }

        debug!(indexed = stats.indexed, failed = stats.failed, "index rebuild finished");
        Ok(stats)
    }

    async fn index_page(
        &self,
        wiki_dir: &Path,
        relative: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let content = std::fs::read_to_string(wiki_dir.join(relative))
            .map_err(|e| OyaError::io(format!("Failed to read page {relative}"), e))?;

        let title = extract_title(relative, &content);
        let page_type = PageType::from_page_path(relative);

        let embed_input: String = content.chars().take(EMBED_MAX_CHARS).collect();
        let embedding =
            embed_with_retry(self.llm, &embed_input, self.max_retries, cancel).await?;

        self.vector
            .insert(relative, &title, page_type.as_str(), &content, &embedding)?;
        self.fts
            .insert(relative, &title, page_type.as_str(), &content)?;
        Ok(())
    }
}

/// Wiki-relative markdown page paths, deterministically sorted.
fn collect_pages(wiki_dir: &Path) -> Vec<String> {
    let mut pages = Vec::new();
    for entry in WalkDir::new(wiki_dir).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(wiki_dir) {
            pages.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    pages.sort();
    pages
}

/// Title from the first heading, else the file stem.
fn extract_title(relative: &str, content: &str) -> String {
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(heading) = trimmed.strip_prefix("# ") {
            return heading.trim().to_string();
        }
    }
    relative
        .rsplit('/')
        .next()
        .unwrap_or(relative)
        .trim_end_matches(".md")
        .to_string()
}
