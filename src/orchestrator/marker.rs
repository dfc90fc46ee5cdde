//! Generation marker: crash-visible run state.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{OyaError, Result};
use crate::orchestrator::progress::Phase;

/// Exit state of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// A worker is (or claims to be) driving the run.
    Running,
    /// The run stopped before promotion; staging is retained.
    Incomplete,
    /// The run promoted successfully.
    Complete,
}

/// Marker file persisted in the staging meta directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationMarker {
    /// Run state
    pub status: RunStatus,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Last phase that completed
    pub last_phase: Option<Phase>,
}

impl GenerationMarker {
    /// A fresh marker for a run starting now.
    pub fn running() -> Self {
        Self {
            status: RunStatus::Running,
            started_at: Utc::now(),
            last_phase: None,
        }
    }

    /// Read the marker at `path`, if present. A corrupt marker is treated as
    /// absent rather than fatal.
    pub fn read(path: &Path) -> Option<Self> {
        let raw = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Write the marker atomically (temp file plus rename).
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OyaError::io("Failed to create meta directory", e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| OyaError::storage(format!("marker serialization failed: {e}")))?;

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| OyaError::io("Failed to write marker", e))?;
        std::fs::rename(&tmp, path).map_err(|e| OyaError::io("Failed to replace marker", e))?;
        Ok(())
    }
}
