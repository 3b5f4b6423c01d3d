use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;

use crate::editor::DraftNote;
use crate::index::OutOfRange;

pub mod fs;

pub use fs::FileSystemRepository;

/// A note snapshot as handed to the application core. The core never mutates
/// note content directly; all mutation goes through [`NoteRepository::save_note`].
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub category: String,
    pub index: usize,
    pub title: String,
    pub text: String,
    pub modified_at: OffsetDateTime,
}

/// Per-note metadata for the active category (list view titles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteMeta {
    pub index: usize,
    pub title: String,
}

/// Result of scanning one category during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDiscovery {
    pub category: String,
    pub image_path: Option<PathBuf>,
    pub notes: Vec<PathBuf>,
}

/// What the state machine needs to populate the category menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: String,
    pub note_count: usize,
}

impl From<&NoteDiscovery> for CategorySummary {
    fn from(discovery: &NoteDiscovery) -> Self {
        Self {
            category: discovery.category.clone(),
            note_count: discovery.notes.len(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    OutOfRange(#[from] OutOfRange),

    /// Navigation over a category with zero notes. Distinct from
    /// [`RepositoryError::OutOfRange`]: the caller did nothing wrong, there
    /// is simply nothing to show.
    #[error("category '{0}' has no notes")]
    EmptyCategory(String),

    #[error("no note at {category}/{index}")]
    NotFound { category: String, index: usize },

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("no active category selected")]
    NoActiveCategory,

    #[error("storage at {path} is unavailable")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Capability contract a storage backend must satisfy to be swappable
/// (filesystem today, embedded DB later). Navigation state lives behind this
/// boundary: the backend owns a [`crate::index::CircularIndex`] scoped to the
/// active category and exposes it through `set_index`/`index_size`.
pub trait NoteRepository {
    fn storage_path(&self) -> &Path;

    /// Point the backend at a new root. Invalidates all cached discovery
    /// results and indices; a fresh `discover_notes` is required afterwards.
    fn set_storage_path(&mut self, path: PathBuf);

    /// Known categories in discovery order (order drives the menu).
    fn categories(&self) -> Vec<String>;

    fn current_category(&self) -> Option<&str>;

    /// Select (or clear, with `None`) the active category. Rebuilds the
    /// internal index sized to that category's note count and restores the
    /// stored cursor position, defaulting to 0.
    fn set_current_category(&mut self, category: Option<&str>) -> Result<(), RepositoryError>;

    /// Metadata for the notes of the active category.
    fn category_meta(&self) -> Vec<NoteMeta>;

    /// Full rescan of the storage root. Idempotent: safe to call repeatedly
    /// without accumulating stale state. Fails with `StorageUnavailable` when
    /// the root is missing or unreadable, leaving previous results untouched.
    fn discover_notes(&mut self) -> Result<Vec<NoteDiscovery>, RepositoryError>;

    fn next_note(&mut self) -> Result<Note, RepositoryError>;

    fn previous_note(&mut self) -> Result<Note, RepositoryError>;

    /// Resolve the cursor position without moving it.
    fn current_note(&self) -> Result<Note, RepositoryError>;

    fn get_note(&self, category: &str, index: usize) -> Result<Note, RepositoryError>;

    /// Upsert a draft. New drafts are appended and come back with their
    /// assigned index; existing drafts overwrite in place.
    fn save_note(&mut self, draft: &DraftNote) -> Result<Note, RepositoryError>;

    fn set_index(&mut self, n: usize) -> Result<(), RepositoryError>;

    fn index_size(&self) -> usize;
}
