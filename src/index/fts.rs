//! Lexical full-text index over wiki pages.
//!
//! An FTS5 virtual table with porter stemming, queried BM25-style. Terms
//! are individually quoted and OR-joined so punctuation in user questions
//! cannot break the match expression.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::core::errors::{OyaError, Result};

const SCHEMA_SQL: &str = r"
CREATE VIRTUAL TABLE IF NOT EXISTS pages_fts USING fts5(
    path,
    title,
    page_type UNINDEXED,
    content,
    tokenize='porter unicode61'
);
";

/// One lexical search hit.
#[derive(Debug, Clone)]
pub struct FtsHit {
    /// Wiki-relative page path
    pub path: String,
    /// Page title
    pub title: String,
    /// Page type name
    pub page_type: String,
    /// Negated BM25 score; higher is better
    pub score: f64,
}

/// Sqlite FTS5 index.
pub struct FtsIndex {
    conn: Mutex<Connection>,
}

impl FtsIndex {
    /// Open (creating if needed) the index at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OyaError::io("Failed to create index directory", e))?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Remove every indexed page.
    pub fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM pages_fts", [])?;
        Ok(())
    }

    /// Index one page.
    pub fn insert(&self, path: &str, title: &str, page_type: &str, content: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO pages_fts (path, title, page_type, content) VALUES (?1, ?2, ?3, ?4)",
            params![path, title, page_type, content],
        )?;
        Ok(())
    }

    /// BM25-ranked top-k pages for `query`.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<FtsHit>> {
        // Quote each term so FTS5 operator characters are treated literally,
        // then OR-join for a forgiving match.
        let match_expr = query
            .split_whitespace()
            .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR ");
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT path, title, page_type, -bm25(pages_fts) AS score
             FROM pages_fts
             WHERE pages_fts MATCH ?1
             ORDER BY score DESC
             LIMIT ?2",
        )?;
        let hits = stmt
            .query_map(params![match_expr, top_k as i64], |row| {
                Ok(FtsHit {
                    path: row.get(0)?,
                    title: row.get(1)?,
                    page_type: row.get(2)?,
                    score: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(hits)
    }

    /// Number of indexed pages.
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pages_fts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| OyaError::storage("lexical index mutex poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn index() -> (TempDir, FtsIndex) {
        let dir = TempDir::new().unwrap();
        let index = FtsIndex::open(&dir.path().join("fts.sqlite")).unwrap();
        (dir, index)
    }

    #[test]
    fn test_insert_and_search() {
        let (_dir, index) = index();
        index
            .insert(
                "files/auth-py.md",
                "auth.py",
                "file",
                "Handles user authentication and login sessions.",
            )
            .unwrap();
        index
            .insert(
                "files/billing-py.md",
                "billing.py",
                "file",
                "Processes invoices and payments.",
            )
            .unwrap();

        let hits = index.search("authentication login", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "files/auth-py.md");
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn test_porter_stemming_matches_variants() {
        let (_dir, index) = index();
        index
            .insert("a.md", "a", "file", "The scheduler processes queued jobs.")
            .unwrap();
        let hits = index.search("processing", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_operator_characters_are_literal() {
        let (_dir, index) = index();
        index
            .insert("a.md", "a", "file", "plain content here")
            .unwrap();
        // Must not panic or error on FTS5 operators in the query.
        let hits = index.search("content* AND (here)", 10).unwrap();
        assert!(!hits.is_empty());
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let (_dir, index) = index();
        index.insert("a.md", "a", "file", "content").unwrap();
        assert!(index.search("   ", 10).unwrap().is_empty());
    }

    #[test]
    fn test_clear() {
        let (_dir, index) = index();
        index.insert("a.md", "a", "file", "content").unwrap();
        index.clear().unwrap();
        assert_eq!(index.count().unwrap(), 0);
    }
}
