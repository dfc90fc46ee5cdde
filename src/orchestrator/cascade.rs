//! Incremental regeneration rules.
//!
//! Pure decision functions so the cascade is unit-testable without a live
//! pipeline. A file regenerates on missing page, changed content hash, or a
//! newer note; a directory regenerates on changed signature or newer note.
//! Directory signatures cover direct children only: grandchild changes do
//! not force parent regeneration on their own.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::store::pages::PageRecord;

/// Monotonic per-run cascade flags, set before Synthesis begins.
#[derive(Debug, Clone, Copy, Default)]
pub struct CascadeFlags {
    /// Any file page was regenerated this run.
    pub files_regenerated: bool,
    /// Any directory page was regenerated this run.
    pub directories_regenerated: bool,
}

impl CascadeFlags {
    /// Whether Synthesis must regenerate.
    pub fn synthesis_needs_regen(&self, synthesis_exists: bool) -> bool {
        self.files_regenerated || self.directories_regenerated || !synthesis_exists
    }
}

/// SHA-256 over the sorted `(direct_child_filename, content_hash)` pairs.
pub fn directory_signature(children: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = children.iter().collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    for (name, hash) in sorted {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(hash.as_bytes());
        hasher.update([b'\n']);
    }
    format!("{:x}", hasher.finalize())
}

/// Whether a file page must regenerate.
pub fn file_needs_regen(
    existing: Option<&PageRecord>,
    content_hash: &str,
    latest_note: Option<DateTime<Utc>>,
) -> bool {
    let Some(record) = existing else {
        return true;
    };
    if record.source_hash != content_hash {
        return true;
    }
    matches!(latest_note, Some(note_time) if note_time > record.generated_at)
}

/// Whether a directory page must regenerate. Same shape as files, with the
/// signature standing in for the content hash.
pub fn directory_needs_regen(
    existing: Option<&PageRecord>,
    signature: &str,
    latest_note: Option<DateTime<Utc>>,
) -> bool {
    file_needs_regen(existing, signature, latest_note)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::schema::PageType;
    use chrono::Duration;

    fn record(hash: &str, generated_at: DateTime<Utc>) -> PageRecord {
        PageRecord {
            path: "files/src-a-py.md".to_string(),
            page_type: PageType::File,
            target: "src/a.py".to_string(),
            source_hash: hash.to_string(),
            word_count: 10,
            generated_at,
            summary_json: None,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_missing_page_regenerates() {
        assert!(file_needs_regen(None, "h1", None));
    }

    #[test]
    fn test_unchanged_hash_skips() {
        let rec = record("h1", Utc::now());
        assert!(!file_needs_regen(Some(&rec), "h1", None));
    }

    #[test]
    fn test_changed_hash_regenerates() {
        let rec = record("h1", Utc::now());
        assert!(file_needs_regen(Some(&rec), "h2", None));
    }

    #[test]
    fn test_newer_note_regenerates() {
        let generated = Utc::now();
        let rec = record("h1", generated);
        let newer = generated + Duration::seconds(5);
        assert!(file_needs_regen(Some(&rec), "h1", Some(newer)));
    }

    #[test]
    fn test_older_note_does_not_regenerate() {
        let generated = Utc::now();
        let rec = record("h1", generated);
        let older = generated - Duration::seconds(5);
        assert!(!file_needs_regen(Some(&rec), "h1", Some(older)));
    }

    #[test]
    fn test_signature_is_order_independent() {
        let a = vec![
            ("a.py".to_string(), "h1".to_string()),
            ("b.py".to_string(), "h2".to_string()),
        ];
        let b = vec![
            ("b.py".to_string(), "h2".to_string()),
            ("a.py".to_string(), "h1".to_string()),
        ];
        assert_eq!(directory_signature(&a), directory_signature(&b));
    }

    #[test]
    fn test_signature_changes_with_child_hash() {
        let before = vec![("a.py".to_string(), "h1".to_string())];
        let after = vec![("a.py".to_string(), "h2".to_string())];
        assert_ne!(directory_signature(&before), directory_signature(&after));
    }

    #[test]
    fn test_signature_changes_with_membership() {
        let one = vec![("a.py".to_string(), "h1".to_string())];
        let two = vec![
            ("a.py".to_string(), "h1".to_string()),
            ("b.py".to_string(), "h2".to_string()),
        ];
        assert_ne!(directory_signature(&one), directory_signature(&two));
    }

    #[test]
    fn test_empty_directory_signature_stable() {
        assert_eq!(directory_signature(&[]), directory_signature(&[]));
    }

    #[test]
    fn test_cascade_flags() {
        let flags = CascadeFlags::default();
        assert!(!flags.synthesis_needs_regen(true));
        assert!(flags.synthesis_needs_regen(false));

        let flags = CascadeFlags {
            files_regenerated: true,
            directories_regenerated: false,
        };
        assert!(flags.synthesis_needs_regen(true));
    }
}
