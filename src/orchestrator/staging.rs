//! Staging area lifecycle: prepare, promote, discard.
//!
//! All writes of a run land in the staging mirror, initialized as a copy of
//! the production set so unchanged artifacts survive promotion. Promotion
//! rotates the previous production directory into quarantine and renames
//! staging into place, so readers only ever observe a fully-previous or
//! fully-new artifact set.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::errors::{OyaError, Result};
use crate::core::repository::{Repository, WikiLayout};

/// The staging mirror owned by a running orchestrator.
#[derive(Debug)]
pub struct StagingArea {
    /// Layout rooted at the staging directory
    pub layout: WikiLayout,
    production: PathBuf,
    quarantine: PathBuf,
}

impl StagingArea {
    /// Create a fresh staging mirror, seeded from production when it exists.
    pub fn prepare(repo: &Repository) -> Result<Self> {
        let staging = repo.staging_dir();
        let production = repo.production_dir();

        if staging.exists() {
            std::fs::remove_dir_all(&staging)
                .map_err(|e| OyaError::io("Failed to clear previous staging directory", e))?;
        }
        std::fs::create_dir_all(&staging)
            .map_err(|e| OyaError::io("Failed to create staging directory", e))?;

        if production.is_dir() {
            copy_dir_all(&production, &staging)
                .map_err(|e| OyaError::io("Failed to seed staging from production", e))?;
            debug!(staging = %staging.display(), "staging seeded from production");
        }

        Ok(Self {
            layout: WikiLayout::new(&staging),
            production,
            quarantine: repo.quarantine_dir(),
        })
    }

    /// Atomically promote staging to production, rotating the previous set
    /// into quarantine.
    pub fn promote(self) -> Result<()> {
        if self.quarantine.exists() {
            std::fs::remove_dir_all(&self.quarantine)
                .map_err(|e| OyaError::io("Failed to clear quarantine directory", e))?;
        }
        if self.production.exists() {
            std::fs::rename(&self.production, &self.quarantine)
                .map_err(|e| OyaError::io("Failed to quarantine previous artifacts", e))?;
        }
        std::fs::rename(self.layout.base(), &self.production)
            .map_err(|e| OyaError::io("Failed to promote staging to production", e))?;
        info!(production = %self.production.display(), "staging promoted");
        Ok(())
    }

    /// Remove the staging directory entirely.
    pub fn discard(self) -> Result<()> {
        if self.layout.base().exists() {
            std::fs::remove_dir_all(self.layout.base())
                .map_err(|e| OyaError::io("Failed to discard staging directory", e))?;
        }
        Ok(())
    }
}

/// Recursive directory copy.
fn copy_dir_all(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_prepare_seeds_from_production() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        write(&repo.production_dir().join("wiki/overview.md"), "# old");

        let staging = StagingArea::prepare(&repo).unwrap();
        let seeded = staging.layout.wiki_dir().join("overview.md");
        assert_eq!(std::fs::read_to_string(seeded).unwrap(), "# old");
    }

    #[test]
    fn test_promote_swaps_and_quarantines() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        write(&repo.production_dir().join("wiki/overview.md"), "# old");

        let staging = StagingArea::prepare(&repo).unwrap();
        write(&staging.layout.wiki_dir().join("overview.md"), "# new");
        staging.promote().unwrap();

        let promoted = repo.production_dir().join("wiki/overview.md");
        assert_eq!(std::fs::read_to_string(promoted).unwrap(), "# new");
        let quarantined = repo.quarantine_dir().join("wiki/overview.md");
        assert_eq!(std::fs::read_to_string(quarantined).unwrap(), "# old");
        assert!(!repo.staging_dir().exists());
    }

    #[test]
    fn test_promote_first_run_without_production() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open(dir.path()).unwrap();

        let staging = StagingArea::prepare(&repo).unwrap();
        write(&staging.layout.wiki_dir().join("overview.md"), "# first");
        staging.promote().unwrap();

        assert!(repo.production_dir().join("wiki/overview.md").exists());
        assert!(!repo.quarantine_dir().exists());
    }

    #[test]
    fn test_discard_removes_staging() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        let staging = StagingArea::prepare(&repo).unwrap();
        write(&staging.layout.wiki_dir().join("x.md"), "x");
        staging.discard().unwrap();
        assert!(!repo.staging_dir().exists());
    }
}
