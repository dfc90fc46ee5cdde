//! Local vector store.
//!
//! Embeddings persist as little-endian `f32` blobs in a sqlite table under
//! the meta directory. Queries load every stored vector and rank by cosine
//! distance; wiki-sized page sets stay far below the point where an ANN
//! index would pay for itself.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::core::errors::{OyaError, Result};

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS embeddings (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    page_type TEXT NOT NULL,
    document TEXT NOT NULL,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL
);
";

/// One semantic search hit.
#[derive(Debug, Clone)]
pub struct VectorHit {
    /// Stable id (wiki-relative page path)
    pub id: String,
    /// Page title
    pub title: String,
    /// Page type name
    pub page_type: String,
    /// Stored document text
    pub document: String,
    /// Cosine distance; lower is better
    pub distance: f32,
}

/// Sqlite-backed vector store.
pub struct VectorStore {
    conn: Mutex<Connection>,
}

impl VectorStore {
    /// Open (creating if needed) the store inside `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| OyaError::io("Failed to create vector store directory", e))?;
        let conn = Connection::open(dir.join("embeddings.sqlite"))?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Remove every stored embedding.
    pub fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM embeddings", [])?;
        Ok(())
    }

    /// Insert or replace one document under a stable id.
    pub fn insert(
        &self,
        id: &str,
        title: &str,
        page_type: &str,
        document: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO embeddings (id, title, page_type, document, embedding, dimensions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                title,
                page_type,
                document,
                encode_embedding(embedding),
                embedding.len() as i64,
            ],
        )?;
        Ok(())
    }

    /// Top-k documents by cosine distance to `query`.
    pub fn query(&self, query: &[f32], top_k: usize) -> Result<Vec<VectorHit>> {
        let rows: Vec<(String, String, String, String, Vec<u8>)> = {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare("SELECT id, title, page_type, document, embedding FROM embeddings")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut hits: Vec<VectorHit> = rows
            .into_iter()
            .map(|(id, title, page_type, document, blob)| {
                let embedding = decode_embedding(&blob);
                VectorHit {
                    id,
                    title,
                    page_type,
                    document,
                    distance: 1.0 - cosine_similarity(query, &embedding),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Number of stored documents.
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| OyaError::storage("vector store mutex poisoned"))
    }
}

/// Serialize an embedding as little-endian `f32` bytes.
fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Deserialize little-endian `f32` bytes.
fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_blob_round_trip() {
        let embedding = vec![0.5f32, -1.25, 3.0];
        assert_eq!(decode_embedding(&encode_embedding(&embedding)), embedding);
    }

    #[test]
    fn test_insert_query_ordering() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();

        store
            .insert("a.md", "A", "file", "doc a", &[1.0, 0.0, 0.0])
            .unwrap();
        store
            .insert("b.md", "B", "file", "doc b", &[0.0, 1.0, 0.0])
            .unwrap();

        let hits = store.query(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].id, "a.md");
        assert!(hits[0].distance < 0.001);
        assert!(hits[1].distance > hits[0].distance);
    }

    #[test]
    fn test_clear_and_replace() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();
        store
            .insert("a.md", "A", "file", "doc", &[1.0, 0.0])
            .unwrap();
        store
            .insert("a.md", "A2", "file", "doc2", &[0.0, 1.0])
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);

        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.query(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
