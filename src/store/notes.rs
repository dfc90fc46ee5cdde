//! Append-only user notes.
//!
//! Each note is one markdown file with a front-matter header, named
//! `<iso-timestamp>-<scope>-<slug>.md`. Notes are immutable once created and
//! deleted only by explicit user action. During a generation run the store
//! is read-only; phases work from a snapshot taken at phase start.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::errors::{OyaError, Result};
use crate::core::slug::path_to_slug;

/// What a note applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteScope {
    File,
    Directory,
    Workflow,
    General,
}

impl NoteScope {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Workflow => "workflow",
            Self::General => "general",
        }
    }

    /// Parse a scope name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "file" => Some(Self::File),
            "directory" => Some(Self::Directory),
            "workflow" => Some(Self::Workflow),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

impl std::fmt::Display for NoteScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable user-authored correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    /// Identifier derived from the file name
    pub id: String,
    /// Scope of the correction
    pub scope: NoteScope,
    /// Target path; empty for general notes
    pub target: String,
    /// Free-form markdown body
    pub content: String,
    /// Optional author
    pub author: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// File-backed notes store.
pub struct NotesStore {
    dir: PathBuf,
}

impl NotesStore {
    /// Create a store over the given notes directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Append a new note. The target is required for every scope except
    /// `general`.
    pub fn add(
        &self,
        scope: NoteScope,
        target: &str,
        content: &str,
        author: Option<&str>,
    ) -> Result<Note> {
        if scope != NoteScope::General && target.is_empty() {
            return Err(OyaError::validation(format!(
                "scope '{scope}' requires a target"
            )));
        }

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| OyaError::io("Failed to create notes directory", e))?;

        let created_at = Utc::now();
        let slug = if target.is_empty() {
            "general".to_string()
        } else {
            path_to_slug(target)
        };
        let base_id = format!(
            "{}-{}-{}",
            created_at.format("%Y%m%dT%H%M%S%3fZ"),
            scope,
            slug
        );
        // Same-millisecond additions for the same target get a counter suffix.
        let mut id = base_id.clone();
        let mut counter = 1;
        while self.dir.join(format!("{id}.md")).exists() {
            id = format!("{base_id}-{counter}");
            counter += 1;
        }

        let mut body = String::new();
        body.push_str("---\n");
        body.push_str(&format!("scope: {scope}\n"));
        body.push_str(&format!("target: {target}\n"));
        if let Some(author) = author {
            body.push_str(&format!("author: {author}\n"));
        }
        body.push_str(&format!("created_at: {}\n", created_at.to_rfc3339()));
        body.push_str("---\n");
        body.push_str(content);

        let path = self.dir.join(format!("{id}.md"));
        std::fs::write(&path, body)
            .map_err(|e| OyaError::io(format!("Failed to write note {id}"), e))?;

        Ok(Note {
            id,
            scope,
            target: target.to_string(),
            content: content.to_string(),
            author: author.map(str::to_string),
            created_at,
        })
    }

    /// All notes, ordered by creation time.
    pub fn all(&self) -> Result<Vec<Note>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut notes = Vec::new();
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| OyaError::io("Failed to read notes directory", e))?;
        for entry in entries {
            let entry = entry.map_err(|e| OyaError::io("Failed to read notes entry", e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            match parse_note_file(&path) {
                Ok(note) => notes.push(note),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unparsable note"),
            }
        }
        notes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(notes)
    }

    /// Snapshot for use during a phase. A query failure degrades to an empty
    /// snapshot with a warning; a failing notes directory never aborts a run.
    pub fn snapshot(&self) -> NotesSnapshot {
        match self.all() {
            Ok(notes) => NotesSnapshot { notes },
            Err(err) => {
                warn!(error = %err, "notes query failed, treating as no notes");
                NotesSnapshot { notes: Vec::new() }
            }
        }
    }

    /// Delete a note by id. Explicit user action only.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let path = self.dir.join(format!("{id}.md"));
        if !path.is_file() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .map_err(|e| OyaError::io(format!("Failed to delete note {id}"), e))?;
        Ok(true)
    }
}

/// Point-in-time view of the notes store.
#[derive(Debug, Clone, Default)]
pub struct NotesSnapshot {
    notes: Vec<Note>,
}

impl NotesSnapshot {
    /// All notes in the snapshot.
    pub fn all(&self) -> &[Note] {
        &self.notes
    }

    /// Notes for a specific scope and target.
    pub fn for_target(&self, scope: NoteScope, target: &str) -> Vec<&Note> {
        self.notes
            .iter()
            .filter(|note| note.scope == scope && note.target == target)
            .collect()
    }

    /// General-scope notes.
    pub fn general(&self) -> Vec<&Note> {
        self.notes
            .iter()
            .filter(|note| note.scope == NoteScope::General)
            .collect()
    }

    /// Creation time of the newest note for the target, if any.
    pub fn latest_for(&self, scope: NoteScope, target: &str) -> Option<DateTime<Utc>> {
        self.for_target(scope, target)
            .iter()
            .map(|note| note.created_at)
            .max()
    }

    /// Join note bodies into a corrections section body; empty string when
    /// no notes apply.
    pub fn corrections_text(notes: &[&Note]) -> String {
        notes
            .iter()
            .map(|note| note.content.trim())
            .filter(|content| !content.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn parse_note_file(path: &std::path::Path) -> Result<Note> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| OyaError::io(format!("Failed to read note {}", path.display()), e))?;

    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut lines = raw.lines();
    if lines.next().map(str::trim) != Some("---") {
        return Err(OyaError::validation("note missing front-matter opening"));
    }

    let mut scope = None;
    let mut target = String::new();
    let mut author = None;
    let mut created_at = None;

    for line in lines.by_ref() {
        let line = line.trim();
        if line == "---" {
            break;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "scope" => scope = NoteScope::parse(value),
            "target" => target = value.to_string(),
            "author" => author = Some(value.to_string()),
            "created_at" => {
                created_at = DateTime::parse_from_rfc3339(value)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc));
            }
            _ => {}
        }
    }

    let content: String = lines.collect::<Vec<_>>().join("\n");

    Ok(Note {
        id,
        scope: scope.ok_or_else(|| OyaError::validation("note missing scope"))?,
        target,
        content,
        author,
        created_at: created_at.ok_or_else(|| OyaError::validation("note missing created_at"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_add_and_read_back() {
        let dir = TempDir::new().unwrap();
        let store = NotesStore::new(dir.path().join("notes"));

        let note = store
            .add(
                NoteScope::File,
                "src/server/router.py",
                "The router also handles websockets.",
                Some("dev@example"),
            )
            .unwrap();
        assert!(note.id.contains("-file-src-server-router-py"));

        let all = store.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].scope, NoteScope::File);
        assert_eq!(all[0].target, "src/server/router.py");
        assert_eq!(all[0].content, "The router also handles websockets.");
        assert_eq!(all[0].author.as_deref(), Some("dev@example"));
    }

    #[test]
    fn test_general_scope_allows_empty_target() {
        let dir = TempDir::new().unwrap();
        let store = NotesStore::new(dir.path().join("notes"));
        let note = store
            .add(NoteScope::General, "", "We deploy on Fridays.", None)
            .unwrap();
        assert!(note.id.ends_with("-general-general"));
    }

    #[test]
    fn test_non_general_scope_requires_target() {
        let dir = TempDir::new().unwrap();
        let store = NotesStore::new(dir.path().join("notes"));
        assert!(store.add(NoteScope::File, "", "orphan", None).is_err());
    }

    #[test]
    fn test_snapshot_queries() {
        let dir = TempDir::new().unwrap();
        let store = NotesStore::new(dir.path().join("notes"));
        store
            .add(NoteScope::File, "src/a.py", "note a", None)
            .unwrap();
        store
            .add(NoteScope::General, "", "general note", None)
            .unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.for_target(NoteScope::File, "src/a.py").len(), 1);
        assert_eq!(snapshot.for_target(NoteScope::File, "src/b.py").len(), 0);
        assert_eq!(snapshot.general().len(), 1);
        assert!(snapshot.latest_for(NoteScope::File, "src/a.py").is_some());
    }

    #[test]
    fn test_snapshot_on_missing_directory_is_empty() {
        let store = NotesStore::new("/nonexistent/notes/dir");
        assert!(store.snapshot().all().is_empty());
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = NotesStore::new(dir.path().join("notes"));
        let note = store
            .add(NoteScope::File, "src/a.py", "note", None)
            .unwrap();
        assert!(store.delete(&note.id).unwrap());
        assert!(!store.delete(&note.id).unwrap());
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_corrections_text_joins_bodies() {
        let dir = TempDir::new().unwrap();
        let store = NotesStore::new(dir.path().join("notes"));
        store.add(NoteScope::File, "a.py", "first", None).unwrap();
        store.add(NoteScope::File, "a.py", "second", None).unwrap();

        let snapshot = store.snapshot();
        let notes = snapshot.for_target(NoteScope::File, "a.py");
        let text = NotesSnapshot::corrections_text(&notes);
        assert!(text.contains("first"));
        assert!(text.contains("second"));
    }
}
