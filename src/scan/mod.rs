//! Repository scanning and content hashing.

pub mod scanner;

pub use scanner::{content_hash, RepositoryScanner, ScanResult};
