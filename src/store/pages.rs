//! Page metadata store.
//!
//! Markdown content lives under `wiki/`; the sqlite side carries the
//! metadata incremental regeneration depends on (source hashes, timestamps)
//! plus the structured summary each page produced, so unchanged pages can
//! feed synthesis without regeneration. Writes are serialized through an
//! interior mutex: single-writer discipline per target path.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::core::errors::{OyaError, Result};
use crate::core::repository::WikiLayout;
use crate::summary::schema::{DirectorySummary, FileSummary, GeneratedPage, PageType};

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS pages (
    path TEXT PRIMARY KEY,
    page_type TEXT NOT NULL,
    target TEXT NOT NULL,
    source_hash TEXT NOT NULL,
    word_count INTEGER NOT NULL,
    generated_at TEXT NOT NULL,
    summary_json TEXT,
    warnings TEXT
);

CREATE INDEX IF NOT EXISTS idx_pages_target ON pages(page_type, target);
";

/// Stored metadata for one wiki page.
#[derive(Debug, Clone)]
pub struct PageRecord {
    /// Wiki-relative page path
    pub path: String,
    /// Page classification
    pub page_type: PageType,
    /// Source path the page documents; empty for synthesized pages
    pub target: String,
    /// Content hash (files) or signature hash (directories)
    pub source_hash: String,
    /// Word count at generation time
    pub word_count: usize,
    /// Generation timestamp
    pub generated_at: DateTime<Utc>,
    /// Structured summary captured at generation time
    pub summary_json: Option<String>,
    /// Warnings recorded during generation (firewall, fallback summaries)
    pub warnings: Vec<String>,
}

impl PageRecord {
    /// Deserialize the stored file summary, when present and well-formed.
    pub fn file_summary(&self) -> Option<FileSummary> {
        self.summary_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
    }

    /// Deserialize the stored directory summary, when present.
    pub fn directory_summary(&self) -> Option<DirectorySummary> {
        self.summary_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
    }
}

/// Persists generated pages and their metadata.
pub struct PageStore {
    conn: Mutex<Connection>,
    wiki_dir: PathBuf,
}

impl PageStore {
    /// Open (creating if needed) the store for the given layout.
    pub fn open(layout: &WikiLayout) -> Result<Self> {
        let wiki_dir = layout.wiki_dir();
        std::fs::create_dir_all(&wiki_dir)
            .map_err(|e| OyaError::io("Failed to create wiki directory", e))?;
        if let Some(parent) = layout.pages_db().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OyaError::io("Failed to create store directory", e))?;
        }

        let conn = Connection::open(layout.pages_db())?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Mutex::new(conn),
            wiki_dir,
        })
    }

    /// Write a page's content and metadata.
    ///
    /// A failure here is a storage error; the orchestrator aborts the run.
    pub fn write_page(&self, page: &GeneratedPage, summary_json: Option<String>) -> Result<()> {
        let file_path = self.wiki_dir.join(&page.path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OyaError::io("Failed to create page directory", e))?;
        }
        std::fs::write(&file_path, &page.content).map_err(|e| {
            OyaError::io(format!("Failed to write page {}", page.path), e)
        })?;

        let conn = self
            .conn
            .lock()
            .map_err(|_| OyaError::storage("page store mutex poisoned"))?;
        let warnings = if page.warnings.is_empty() {
            None
        } else {
            serde_json::to_string(&page.warnings).ok()
        };
        conn.execute(
            "INSERT OR REPLACE INTO pages
             (path, page_type, target, source_hash, word_count, generated_at, summary_json, warnings)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                page.path,
                page.page_type.as_str(),
                page.target,
                page.source_hash,
                page.word_count as i64,
                page.generated_at.to_rfc3339(),
                summary_json,
                warnings,
            ],
        )?;
        debug!(path = %page.path, "page written");
        Ok(())
    }

    /// Metadata for the page documenting `target`, if one exists.
    pub fn record_for_target(
        &self,
        page_type: PageType,
        target: &str,
    ) -> Result<Option<PageRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| OyaError::storage("page store mutex poisoned"))?;
        conn.query_row(
            "SELECT path, page_type, target, source_hash, word_count, generated_at, summary_json, warnings
             FROM pages WHERE page_type = ?1 AND target = ?2",
            params![page_type.as_str(), target],
            row_to_record,
        )
        .optional()
        .map_err(Into::into)
    }

    /// All stored page records, ordered by path.
    pub fn all_records(&self) -> Result<Vec<PageRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| OyaError::storage("page store mutex poisoned"))?;
        let mut stmt = conn.prepare(
            "SELECT path, page_type, target, source_hash, word_count, generated_at, summary_json, warnings
             FROM pages ORDER BY path",
        )?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Delete pages of `page_type` whose target is no longer present,
    /// removing both metadata and content. Returns the removed targets.
    pub fn prune_removed(
        &self,
        page_type: PageType,
        live_targets: &HashSet<String>,
    ) -> Result<Vec<String>> {
        let stale: Vec<(String, String)> = {
            let conn = self
                .conn
                .lock()
                .map_err(|_| OyaError::storage("page store mutex poisoned"))?;
            let mut stmt =
                conn.prepare("SELECT path, target FROM pages WHERE page_type = ?1")?;
            let rows = stmt
                .query_map(params![page_type.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter()
                .filter(|(_, target)| !live_targets.contains(target))
                .collect()
        };

        let mut removed = Vec::with_capacity(stale.len());
        for (path, target) in stale {
            if let Err(err) = std::fs::remove_file(self.wiki_dir.join(&path)) {
                warn!(path = %path, error = %err, "failed to remove stale page file");
            }
            let conn = self
                .conn
                .lock()
                .map_err(|_| OyaError::storage("page store mutex poisoned"))?;
            conn.execute("DELETE FROM pages WHERE path = ?1", params![path])?;
            removed.push(target);
        }
        Ok(removed)
    }

    /// Number of stored pages.
    pub fn page_count(&self) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| OyaError::storage("page store mutex poisoned"))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PageRecord> {
    let generated_at: String = row.get(5)?;
    let warnings: Option<String> = row.get(7)?;
    Ok(PageRecord {
        path: row.get(0)?,
        page_type: PageType::parse_lenient(&row.get::<_, String>(1)?),
        target: row.get(2)?,
        source_hash: row.get(3)?,
        word_count: row.get::<_, i64>(4)? as usize,
        generated_at: DateTime::parse_from_rfc3339(&generated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        summary_json: row.get(6)?,
        warnings: warnings
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default(),
    })
}
