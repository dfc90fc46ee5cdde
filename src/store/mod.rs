//! Persistence for generated pages and user notes.

pub mod notes;
pub mod pages;

pub use notes::{Note, NoteScope, NotesSnapshot, NotesStore};
pub use pages::{PageRecord, PageStore};
