//! Wiki indexing: vector store, lexical index, embedding provenance.

pub mod fts;
pub mod indexer;
pub mod vector;

pub use fts::{FtsHit, FtsIndex};
pub use indexer::{EmbeddingMetadata, IndexStats, Indexer};
pub use vector::{VectorHit, VectorStore};
