//! Repository identity and on-disk wiki layout.
//!
//! A [`Repository`] is resolved once per generation run and carries the head
//! metadata rendered into overview prompts. [`WikiLayout`] maps a base
//! directory (production, staging, or quarantine) to the fixed artifact
//! layout used by every store.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::errors::Result;

/// Name of the hidden directory holding all generated artifacts.
pub const HIDDEN_DIR: &str = ".oya";

/// Suffix appended to the hidden directory for the staging mirror.
pub const STAGING_SUFFIX: &str = "-building";

/// Suffix appended to the hidden directory for the quarantined previous set.
pub const QUARANTINE_SUFFIX: &str = "-quarantine";

/// Name of the user-supplied ignore file (gitignore syntax).
pub const IGNORE_FILE: &str = ".oyaignore";

/// The repository a generation run operates on.
#[derive(Debug, Clone)]
pub struct Repository {
    /// Absolute root path of the working tree.
    pub root: PathBuf,
    /// Head revision id, or a placeholder for non-git directories.
    pub head_revision: String,
    /// Head commit summary line.
    pub head_message: String,
    /// Current branch name.
    pub branch: String,
}

impl Repository {
    /// Resolve repository metadata for `root`.
    ///
    /// Non-git directories are fully supported; they get placeholder head
    /// metadata rather than an error.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root: PathBuf = root.into();
        let root = std::fs::canonicalize(&root).unwrap_or(root);

        match git2::Repository::discover(&root) {
            Ok(repo) => {
                let head = repo.head().ok();
                let branch = head
                    .as_ref()
                    .and_then(|h| h.shorthand())
                    .unwrap_or("detached")
                    .to_string();
                let (head_revision, head_message) = match head.as_ref().and_then(|h| h.target()) {
                    Some(oid) => {
                        let message = repo
                            .find_commit(oid)
                            .ok()
                            .and_then(|c| c.summary().map(str::to_string))
                            .unwrap_or_default();
                        (oid.to_string(), message)
                    }
                    None => ("unborn".to_string(), String::new()),
                };
                debug!(branch = %branch, revision = %head_revision, "resolved git repository");
                Ok(Self {
                    root,
                    head_revision,
                    head_message,
                    branch,
                })
            }
            Err(_) => {
                debug!(root = %root.display(), "no git metadata, using placeholders");
                Ok(Self {
                    root,
                    head_revision: "workdir".to_string(),
                    head_message: String::new(),
                    branch: "unknown".to_string(),
                })
            }
        }
    }

    /// Short display name of the repository (directory name).
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repository".to_string())
    }

    /// Production artifact directory.
    pub fn production_dir(&self) -> PathBuf {
        self.root.join(HIDDEN_DIR)
    }

    /// Staging artifact directory used while a run is in flight.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(format!("{HIDDEN_DIR}{STAGING_SUFFIX}"))
    }

    /// Quarantine directory the previous artifact set is rotated into.
    pub fn quarantine_dir(&self) -> PathBuf {
        self.root.join(format!("{HIDDEN_DIR}{QUARANTINE_SUFFIX}"))
    }
}

/// Fixed layout of generated artifacts under a base directory.
///
/// The same layout applies to the production directory and its staging
/// mirror, so stores are constructed against whichever base the caller owns.
#[derive(Debug, Clone)]
pub struct WikiLayout {
    base: PathBuf,
}

impl WikiLayout {
    /// Create a layout rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The base directory itself.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Markdown wiki pages.
    pub fn wiki_dir(&self) -> PathBuf {
        self.base.join("wiki")
    }

    /// User notes directory.
    pub fn notes_dir(&self) -> PathBuf {
        self.base.join("notes")
    }

    /// Metadata directory (synthesis, marker, indexes).
    pub fn meta_dir(&self) -> PathBuf {
        self.base.join("meta")
    }

    /// Page metadata database.
    pub fn pages_db(&self) -> PathBuf {
        self.base.join("pages.sqlite")
    }

    /// Persisted synthesis map.
    pub fn synthesis_file(&self) -> PathBuf {
        self.meta_dir().join("synthesis.json")
    }

    /// Embedding provenance record.
    pub fn embedding_metadata_file(&self) -> PathBuf {
        self.meta_dir().join("embedding_metadata.json")
    }

    /// Generation marker file.
    pub fn marker_file(&self) -> PathBuf {
        self.meta_dir().join("generation.marker")
    }

    /// Vector store directory.
    pub fn vector_dir(&self) -> PathBuf {
        self.meta_dir().join("vector")
    }

    /// Lexical full-text index database.
    pub fn fts_db(&self) -> PathBuf {
        self.meta_dir().join("fts.sqlite")
    }

    /// User-supplied ignore file.
    pub fn ignore_file(&self) -> PathBuf {
        self.base.join(IGNORE_FILE)
    }
}
