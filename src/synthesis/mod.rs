//! Codebase-wide synthesis: aggregation, batching, merge, persistence.

pub mod builder;

pub use builder::{compute_layers, merge_maps, SynthesisBuilder};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::errors::{OyaError, Result};
use crate::summary::schema::SynthesisMap;

/// On-disk form of `synthesis.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSynthesis {
    /// The synthesis map itself
    #[serde(flatten)]
    pub map: SynthesisMap,
    /// Short content hash of the serialized map, for cascade detection
    pub synthesis_hash: String,
    /// When the map was produced
    pub generated_at: DateTime<Utc>,
}

/// Short content hash of a synthesis map's serialization.
pub fn synthesis_hash(map: &SynthesisMap) -> String {
    let serialized = serde_json::to_string(map).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Persist `map` to `path`, returning the persisted form.
pub fn save_synthesis(path: &std::path::Path, map: &SynthesisMap) -> Result<PersistedSynthesis> {
    let persisted = PersistedSynthesis {
        synthesis_hash: synthesis_hash(map),
        map: map.clone(),
        generated_at: Utc::now(),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| OyaError::io("Failed to create meta directory", e))?;
    }
    let json = serde_json::to_string_pretty(&persisted)
        .map_err(|e| OyaError::storage(format!("synthesis serialization failed: {e}")))?;
    std::fs::write(path, json).map_err(|e| OyaError::io("Failed to write synthesis.json", e))?;
    Ok(persisted)
}

/// Load `synthesis.json` when present.
pub fn load_synthesis(path: &std::path::Path) -> Result<Option<PersistedSynthesis>> {
    if !path.is_file() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| OyaError::io("Failed to read synthesis.json", e))?;
    let persisted = serde_json::from_str(&raw)
        .map_err(|e| OyaError::storage(format!("synthesis.json is corrupt: {e}")))?;
    Ok(Some(persisted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_is_stable_and_short() {
        let map = SynthesisMap {
            project_summary: "demo".to_string(),
            ..Default::default()
        };
        assert_eq!(synthesis_hash(&map), synthesis_hash(&map));
        assert_eq!(synthesis_hash(&map).len(), 16);
        assert_ne!(synthesis_hash(&map), synthesis_hash(&SynthesisMap::default()));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta/synthesis.json");
        let map = SynthesisMap {
            project_summary: "demo".to_string(),
            ..Default::default()
        };

        let saved = save_synthesis(&path, &map).unwrap();
        let loaded = load_synthesis(&path).unwrap().unwrap();
        assert_eq!(loaded.synthesis_hash, saved.synthesis_hash);
        assert_eq!(loaded.map.project_summary, "demo");
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_synthesis(&dir.path().join("synthesis.json"))
            .unwrap()
            .is_none());
    }
}
