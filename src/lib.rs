//! # Oya-RS: Repository Wiki Generator & Grounded Q&A Engine
//!
//! Generates a navigable, searchable wiki for an arbitrary source-code
//! repository through a bottom-up, 8-phase pipeline, then answers questions
//! grounded in the indexed result. Capabilities:
//!
//! - **Incremental regeneration**: content-hash and directory-signature
//!   change detection with cascade-correct invalidation
//! - **Bottom-up synthesis**: per-file and per-directory summaries are
//!   aggregated into a codebase-wide layered model, batched under a token
//!   budget when the repository outgrows a single model call
//! - **Hybrid retrieval**: semantic (vector) plus lexical (BM25) search with
//!   an evidence gate and citation validation
//! - **Notes-driven corrections**: user notes invalidate pages and are
//!   injected into regeneration prompts as ground truth
//! - **Crash-safe staging**: every run writes into a shadow directory that
//!   is atomically promoted, so readers never observe partial state
//!
//! ## Architecture
//!
//! ```text
//! Analysis ─┬─► Files ────────┐
//!           └─► Directories ──┼─► Synthesis ──┬─► Architecture
//!                             │               ├─► Overview
//!                             │               └─► Workflows
//!                             └───────────────────────┴─► Indexing
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use oya_rs::{GenerationOrchestrator, OyaConfig, Repository};
//! use oya_rs::llm::HttpLlmClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = Repository::open("./my-project")?;
//!     let config = OyaConfig::discover(&repo.root)?;
//!     let llm = Arc::new(HttpLlmClient::from_config(
//!         config.llm.clone(),
//!         config.generation.llm_timeout_secs,
//!     )?);
//!
//!     let orchestrator = GenerationOrchestrator::new(repo, config, llm)?;
//!     let report = orchestrator.run().await?;
//!     println!("regenerated {} file pages", report.files.regenerated);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

// Core types and shared utilities
pub mod core {
    //! Core types: errors, configuration, repository identity, shared
    //! utilities.

    pub mod config;
    pub mod errors;
    pub mod repository;
    pub mod slug;
    pub mod tokens;
}

// Repository scanning
pub mod scan;

// Symbol extraction
pub mod parse;

// Structured summaries and block parsing
pub mod summary;

// Prompt rendering and the language firewall
pub mod prompt;

// LLM client adapter
pub mod llm;

// Page and notes persistence
pub mod store;

// Phase generators
pub mod phases;

// Synthesis map construction
pub mod synthesis;

// Generation orchestration
pub mod orchestrator;

// Vector and lexical indexing
pub mod index;

// Grounded Q&A
pub mod qa;

// Re-export primary types for convenience
pub use core::config::OyaConfig;
pub use core::errors::{OyaError, Result};
pub use core::repository::Repository;
pub use orchestrator::{GenerationOrchestrator, GenerationReport, ProgressEvent, ProgressSender};
pub use qa::{QaAnswer, QaEngine};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
