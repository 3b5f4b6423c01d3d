use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use time::OffsetDateTime;

use crate::editor::DraftNote;
use crate::index::CircularIndex;

use super::{Note, NoteDiscovery, NoteMeta, NoteRepository, RepositoryError};

const POSITIONS_FILE: &str = ".notekiosk-positions.json";
const NOTE_EXTENSION: &str = "md";
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Filesystem note backend. Each child directory of the storage root is a
/// category; each regular file inside is a note whose first line is its
/// title. Notes are ordered by modification time (name as tie-break),
/// newest-first when `new_first` is set. The per-category cursor position is
/// remembered across category switches and persisted to a JSON state file in
/// the storage root so the kiosk resumes where it left off.
#[derive(Debug)]
pub struct FileSystemRepository {
    root: PathBuf,
    new_first: bool,
    categories: IndexMap<String, CategoryEntry>,
    active: Option<ActiveCategory>,
    positions: HashMap<String, usize>,
    positions_loaded: bool,
}

#[derive(Debug, Clone)]
struct CategoryEntry {
    image_path: Option<PathBuf>,
    notes: Vec<NoteSlot>,
}

#[derive(Debug, Clone)]
struct NoteSlot {
    path: PathBuf,
    title: String,
    modified_at: OffsetDateTime,
}

#[derive(Debug)]
struct ActiveCategory {
    name: String,
    index: CircularIndex,
}

impl FileSystemRepository {
    pub fn new(root: PathBuf, new_first: bool) -> Self {
        Self {
            root,
            new_first,
            categories: IndexMap::new(),
            active: None,
            positions: HashMap::new(),
            positions_loaded: false,
        }
    }

    pub fn new_first(&self) -> bool {
        self.new_first
    }

    fn note_at(&self, category: &str, index: usize) -> Result<Note, RepositoryError> {
        let entry = self
            .categories
            .get(category)
            .ok_or_else(|| RepositoryError::UnknownCategory(category.to_string()))?;
        let slot = entry
            .notes
            .get(index)
            .ok_or_else(|| RepositoryError::NotFound {
                category: category.to_string(),
                index,
            })?;
        let raw =
            fs::read_to_string(&slot.path).map_err(|source| RepositoryError::StorageUnavailable {
                path: slot.path.clone(),
                source,
            })?;
        let (_, text) = split_note(&raw);
        Ok(Note {
            category: category.to_string(),
            index,
            title: slot.title.clone(),
            text,
            modified_at: slot.modified_at,
        })
    }

    fn scan_category(&self, dir: &Path) -> io::Result<CategoryEntry> {
        let mut notes = Vec::new();
        let mut image_path = None;
        for entry in fs::read_dir(dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(?err, dir = %dir.display(), "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase);
            if let Some(ext) = extension.as_deref() {
                if IMAGE_EXTENSIONS.contains(&ext) {
                    if image_path.is_none() {
                        image_path = Some(path);
                    }
                    continue;
                }
            }
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!(?err, path = %path.display(), "skipping unreadable note");
                    continue;
                }
            };
            let modified_at = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .map(OffsetDateTime::from)
                .unwrap_or_else(|_| OffsetDateTime::now_utc());
            let (title, _) = split_note(&raw);
            let title = if title.is_empty() {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default()
            } else {
                title
            };
            notes.push(NoteSlot {
                path,
                title,
                modified_at,
            });
        }
        notes.sort_by(|a, b| (a.modified_at, &a.path).cmp(&(b.modified_at, &b.path)));
        if self.new_first {
            notes.reverse();
        }
        Ok(CategoryEntry { image_path, notes })
    }

    fn rebind_active(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let Some(entry) = self.categories.get(&active.name) else {
            tracing::info!(category = %active.name, "active category vanished during rescan");
            return;
        };
        let mut index = CircularIndex::new(entry.notes.len());
        if let Some(&position) = self.positions.get(&active.name) {
            if position < entry.notes.len() {
                let _ = index.set_current(position);
            }
        }
        self.active = Some(ActiveCategory {
            name: active.name,
            index,
        });
    }

    fn positions_path(&self) -> PathBuf {
        self.root.join(POSITIONS_FILE)
    }

    fn load_positions(&mut self) {
        if self.positions_loaded {
            return;
        }
        self.positions_loaded = true;
        let path = self.positions_path();
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return,
            Err(err) => {
                tracing::warn!(?err, path = %path.display(), "could not read positions state");
                return;
            }
        };
        match serde_json::from_slice::<HashMap<String, usize>>(&raw) {
            Ok(positions) => self.positions = positions,
            Err(err) => {
                tracing::warn!(?err, path = %path.display(), "ignoring malformed positions state");
            }
        }
    }

    fn store_positions(&self) {
        let path = self.positions_path();
        let json = match serde_json::to_vec_pretty(&self.positions) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(?err, "could not serialise positions state");
                return;
            }
        };
        if let Err(err) = write_atomic(&path, &json) {
            tracing::warn!(?err, path = %path.display(), "could not persist positions state");
        }
    }

    fn remember_active_position(&mut self) {
        if let Some(active) = &self.active {
            self.positions
                .insert(active.name.clone(), active.index.current());
        }
    }
}

impl NoteRepository for FileSystemRepository {
    fn storage_path(&self) -> &Path {
        &self.root
    }

    fn set_storage_path(&mut self, path: PathBuf) {
        self.root = path;
        self.categories.clear();
        self.active = None;
        self.positions.clear();
        self.positions_loaded = false;
    }

    fn categories(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    fn current_category(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.name.as_str())
    }

    fn set_current_category(&mut self, category: Option<&str>) -> Result<(), RepositoryError> {
        self.remember_active_position();
        self.active = None;
        let Some(name) = category else {
            self.store_positions();
            return Ok(());
        };
        let entry = self
            .categories
            .get(name)
            .ok_or_else(|| RepositoryError::UnknownCategory(name.to_string()))?;
        let mut index = CircularIndex::new(entry.notes.len());
        if let Some(&position) = self.positions.get(name) {
            if position < entry.notes.len() {
                let _ = index.set_current(position);
            }
        }
        self.active = Some(ActiveCategory {
            name: name.to_string(),
            index,
        });
        self.store_positions();
        Ok(())
    }

    fn category_meta(&self) -> Vec<NoteMeta> {
        let Some(active) = &self.active else {
            return Vec::new();
        };
        let Some(entry) = self.categories.get(&active.name) else {
            return Vec::new();
        };
        entry
            .notes
            .iter()
            .enumerate()
            .map(|(index, slot)| NoteMeta {
                index,
                title: slot.title.clone(),
            })
            .collect()
    }

    fn discover_notes(&mut self) -> Result<Vec<NoteDiscovery>, RepositoryError> {
        let entries =
            fs::read_dir(&self.root).map_err(|source| RepositoryError::StorageUnavailable {
                path: self.root.clone(),
                source,
            })?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(?err, root = %self.root.display(), "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();

        let mut categories = IndexMap::with_capacity(dirs.len());
        for dir in dirs {
            let name = match dir.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            match self.scan_category(&dir) {
                Ok(entry) => {
                    categories.insert(name, entry);
                }
                Err(err) => {
                    tracing::warn!(?err, category = %name, "skipping unreadable category");
                }
            }
        }

        // Only now that the rescan succeeded do we replace the cached state.
        self.categories = categories;
        self.load_positions();
        self.rebind_active();

        Ok(self
            .categories
            .iter()
            .map(|(name, entry)| NoteDiscovery {
                category: name.clone(),
                image_path: entry.image_path.clone(),
                notes: entry.notes.iter().map(|slot| slot.path.clone()).collect(),
            })
            .collect())
    }

    fn next_note(&mut self) -> Result<Note, RepositoryError> {
        let (name, index) = {
            let active = self.active.as_mut().ok_or(RepositoryError::NoActiveCategory)?;
            if active.index.is_empty() {
                return Err(RepositoryError::EmptyCategory(active.name.clone()));
            }
            active.index.next();
            (active.name.clone(), active.index.current())
        };
        self.note_at(&name, index)
    }

    fn previous_note(&mut self) -> Result<Note, RepositoryError> {
        let (name, index) = {
            let active = self.active.as_mut().ok_or(RepositoryError::NoActiveCategory)?;
            if active.index.is_empty() {
                return Err(RepositoryError::EmptyCategory(active.name.clone()));
            }
            active.index.previous();
            (active.name.clone(), active.index.current())
        };
        self.note_at(&name, index)
    }

    fn current_note(&self) -> Result<Note, RepositoryError> {
        let active = self.active.as_ref().ok_or(RepositoryError::NoActiveCategory)?;
        if active.index.is_empty() {
            return Err(RepositoryError::EmptyCategory(active.name.clone()));
        }
        self.note_at(&active.name, active.index.current())
    }

    fn get_note(&self, category: &str, index: usize) -> Result<Note, RepositoryError> {
        self.note_at(category, index)
    }

    fn save_note(&mut self, draft: &DraftNote) -> Result<Note, RepositoryError> {
        if !self.categories.contains_key(&draft.category) {
            return Err(RepositoryError::UnknownCategory(draft.category.clone()));
        }
        let dir = self.root.join(&draft.category);
        let path = match draft.index {
            Some(index) => {
                let entry = &self.categories[&draft.category];
                entry
                    .notes
                    .get(index)
                    .ok_or_else(|| RepositoryError::NotFound {
                        category: draft.category.clone(),
                        index,
                    })?
                    .path
                    .clone()
            }
            None => unique_note_path(&dir, &draft.title),
        };

        let contents = format!("{}\n\n{}", draft.title.trim(), draft.text);
        write_atomic(&path, contents.as_bytes()).map_err(|source| {
            RepositoryError::StorageUnavailable {
                path: path.clone(),
                source,
            }
        })?;

        // The note count or ordering may have changed: rescan the category
        // and rebuild the index fresh rather than patching it in place.
        let rescanned =
            self.scan_category(&dir)
                .map_err(|source| RepositoryError::StorageUnavailable {
                    path: dir.clone(),
                    source,
                })?;
        self.categories.insert(draft.category.clone(), rescanned);

        let entry = &self.categories[&draft.category];
        let assigned = entry
            .notes
            .iter()
            .position(|slot| slot.path == path)
            .ok_or_else(|| RepositoryError::NotFound {
                category: draft.category.clone(),
                index: draft.index.unwrap_or(entry.notes.len()),
            })?;

        if self
            .active
            .as_ref()
            .map(|active| active.name == draft.category)
            .unwrap_or(false)
        {
            let mut index = CircularIndex::new(entry.notes.len());
            let _ = index.set_current(assigned);
            self.active = Some(ActiveCategory {
                name: draft.category.clone(),
                index,
            });
        }
        self.positions.insert(draft.category.clone(), assigned);
        self.store_positions();

        self.note_at(&draft.category, assigned)
    }

    fn set_index(&mut self, n: usize) -> Result<(), RepositoryError> {
        let active = self.active.as_mut().ok_or(RepositoryError::NoActiveCategory)?;
        active.index.set_current(n)?;
        Ok(())
    }

    fn index_size(&self) -> usize {
        self.active
            .as_ref()
            .map(|active| active.index.size())
            .unwrap_or(0)
    }
}

/// First line is the title (an optional leading `#` is stripped), the rest is
/// the body with leading blank lines removed.
fn split_note(raw: &str) -> (String, String) {
    let mut lines = raw.lines();
    let title = lines
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('#')
        .trim()
        .to_string();
    let rest: Vec<&str> = lines.collect();
    let skip = rest
        .iter()
        .take_while(|line| line.trim().is_empty())
        .count();
    (title, rest[skip..].join("\n"))
}

/// The tmp name is dot-prefixed so a crash between write and rename leaves
/// a file the scanner already skips, never a phantom note.
fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)
}

fn unique_note_path(dir: &Path, title: &str) -> PathBuf {
    let slug = slugify(title);
    let mut candidate = dir.join(format!("{slug}.{NOTE_EXTENSION}"));
    let mut counter = 2;
    while candidate.exists() {
        candidate = dir.join(format!("{slug}-{counter}.{NOTE_EXTENSION}"));
        counter += 1;
    }
    candidate
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if matches!(ch, ' ' | '-' | '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "note".to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_note(root: &Path, category: &str, file: &str, title: &str, body: &str) {
        let dir = root.join(category);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), format!("{title}\n\n{body}")).unwrap();
        // Distinct modification times keep the ordering deterministic.
        thread::sleep(Duration::from_millis(15));
    }

    fn seeded_repository(new_first: bool) -> (TempDir, FileSystemRepository) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_note(root, "Work", "alpha.md", "Alpha", "first body");
        write_note(root, "Work", "beta.md", "Beta", "second body");
        write_note(root, "Work", "gamma.md", "Gamma", "third body");
        write_note(root, "Home", "recipes.md", "Recipes", "soup");
        fs::create_dir_all(root.join("Empty")).unwrap();
        let mut repository = FileSystemRepository::new(root.to_path_buf(), new_first);
        repository.discover_notes().unwrap();
        (temp, repository)
    }

    #[test]
    fn discovery_lists_categories_in_order() {
        let (_temp, repository) = seeded_repository(false);
        assert_eq!(repository.categories(), vec!["Empty", "Home", "Work"]);
    }

    #[test]
    fn discovery_reports_note_paths_and_counts() {
        let (_temp, mut repository) = seeded_repository(false);
        let discovered = repository.discover_notes().unwrap();
        let work = discovered
            .iter()
            .find(|d| d.category == "Work")
            .expect("work category");
        assert_eq!(work.notes.len(), 3);
        let empty = discovered
            .iter()
            .find(|d| d.category == "Empty")
            .expect("empty category");
        assert!(empty.notes.is_empty());
    }

    #[test]
    fn next_note_cycles_through_category() {
        let (_temp, mut repository) = seeded_repository(false);
        repository.set_current_category(Some("Work")).unwrap();
        assert_eq!(repository.index_size(), 3);
        assert_eq!(repository.current_note().unwrap().index, 0);

        let positions: Vec<usize> = (0..3)
            .map(|_| repository.next_note().unwrap().index)
            .collect();
        assert_eq!(positions, vec![1, 2, 0]);
    }

    #[test]
    fn new_first_reverses_note_order() {
        let (_temp, mut repository) = seeded_repository(true);
        repository.set_current_category(Some("Work")).unwrap();
        let newest = repository.current_note().unwrap();
        assert_eq!(newest.title, "Gamma");
    }

    #[test]
    fn empty_category_is_reported_distinctly() {
        let (_temp, mut repository) = seeded_repository(false);
        repository.set_current_category(Some("Empty")).unwrap();
        assert_matches!(
            repository.current_note(),
            Err(RepositoryError::EmptyCategory(name)) if name == "Empty"
        );
        assert_matches!(
            repository.next_note(),
            Err(RepositoryError::EmptyCategory(_))
        );
    }

    #[test]
    fn get_note_misses_are_not_found() {
        let (_temp, repository) = seeded_repository(false);
        let note = repository.get_note("Work", 1).unwrap();
        assert_eq!(note.title, "Beta");
        assert_eq!(note.text, "second body");
        assert_matches!(
            repository.get_note("Work", 9),
            Err(RepositoryError::NotFound { index: 9, .. })
        );
        assert_matches!(
            repository.get_note("Nope", 0),
            Err(RepositoryError::UnknownCategory(_))
        );
    }

    #[test]
    fn failed_discovery_leaves_categories_unchanged() {
        let (temp, mut repository) = seeded_repository(false);
        let before = repository.categories();
        fs::remove_dir_all(temp.path()).unwrap();
        assert_matches!(
            repository.discover_notes(),
            Err(RepositoryError::StorageUnavailable { .. })
        );
        assert_eq!(repository.categories(), before);
    }

    #[test]
    fn save_appends_new_note_with_assigned_index() {
        let (_temp, mut repository) = seeded_repository(false);
        repository.set_current_category(Some("Work")).unwrap();
        let draft = DraftNote {
            category: "Work".to_string(),
            index: None,
            title: "T".to_string(),
            text: "hi".to_string(),
        };
        thread::sleep(Duration::from_millis(15));
        let saved = repository.save_note(&draft).unwrap();
        assert_eq!(saved.index, 3, "oldest-first ordering appends at the end");
        assert_eq!(repository.index_size(), 4);

        let fetched = repository.get_note("Work", saved.index).unwrap();
        assert_eq!(fetched.title, "T");
        assert_eq!(fetched.text, "hi");
    }

    #[test]
    fn save_overwrites_existing_note_body() {
        let (_temp, mut repository) = seeded_repository(false);
        let note = repository.get_note("Home", 0).unwrap();
        let draft = DraftNote {
            category: note.category.clone(),
            index: Some(note.index),
            title: note.title.clone(),
            text: "stew".to_string(),
        };
        repository.save_note(&draft).unwrap();
        let updated = repository.get_note("Home", 0).unwrap();
        assert_eq!(updated.title, "Recipes");
        assert_eq!(updated.text, "stew");
    }

    #[test]
    fn save_into_unknown_category_fails() {
        let (_temp, mut repository) = seeded_repository(false);
        let draft = DraftNote {
            category: "Nowhere".to_string(),
            index: None,
            title: "T".to_string(),
            text: "hi".to_string(),
        };
        assert_matches!(
            repository.save_note(&draft),
            Err(RepositoryError::UnknownCategory(_))
        );
    }

    #[test]
    fn cursor_position_survives_category_switches() {
        let (_temp, mut repository) = seeded_repository(false);
        repository.set_current_category(Some("Work")).unwrap();
        repository.next_note().unwrap();
        repository.next_note().unwrap();
        assert_eq!(repository.current_note().unwrap().index, 2);

        repository.set_current_category(Some("Home")).unwrap();
        repository.set_current_category(Some("Work")).unwrap();
        assert_eq!(repository.current_note().unwrap().index, 2);
    }

    #[test]
    fn cursor_positions_persist_across_instances() {
        let (temp, mut repository) = seeded_repository(false);
        repository.set_current_category(Some("Work")).unwrap();
        repository.next_note().unwrap();
        repository.set_current_category(None).unwrap();

        let mut fresh = FileSystemRepository::new(temp.path().to_path_buf(), false);
        fresh.discover_notes().unwrap();
        fresh.set_current_category(Some("Work")).unwrap();
        assert_eq!(fresh.current_note().unwrap().index, 1);
    }

    #[test]
    fn interrupted_write_leftovers_are_not_notes() {
        let (temp, mut repository) = seeded_repository(false);
        // What a crash between the tmp write and the rename leaves behind.
        fs::write(temp.path().join("Work/.delta.md.tmp"), "Delta\n\norphan").unwrap();
        repository.discover_notes().unwrap();
        repository.set_current_category(Some("Work")).unwrap();
        assert_eq!(repository.index_size(), 3);
        let titles: Vec<String> = repository
            .category_meta()
            .into_iter()
            .map(|meta| meta.title)
            .collect();
        assert!(!titles.contains(&"Delta".to_string()));
    }

    #[test]
    fn changing_storage_path_invalidates_cached_state() {
        let (_temp, mut repository) = seeded_repository(false);
        repository.set_current_category(Some("Work")).unwrap();
        repository.next_note().unwrap();

        let other = TempDir::new().unwrap();
        write_note(other.path(), "Garden", "seeds.md", "Seeds", "carrots");
        write_note(other.path(), "Garden", "tools.md", "Tools", "trowel");
        fs::write(other.path().join(POSITIONS_FILE), r#"{"Garden":1}"#).unwrap();

        repository.set_storage_path(other.path().to_path_buf());
        assert!(repository.categories().is_empty());
        assert_eq!(repository.current_category(), None);
        assert_eq!(repository.index_size(), 0);

        repository.discover_notes().unwrap();
        assert_eq!(repository.categories(), vec!["Garden"]);
        // The new root's own positions file is honoured, not the old one's.
        repository.set_current_category(Some("Garden")).unwrap();
        assert_eq!(repository.current_note().unwrap().index, 1);
    }

    #[test]
    fn set_index_rejects_out_of_range() {
        let (_temp, mut repository) = seeded_repository(false);
        repository.set_current_category(Some("Work")).unwrap();
        repository.set_index(2).unwrap();
        assert_eq!(repository.current_note().unwrap().index, 2);
        assert_matches!(
            repository.set_index(3),
            Err(RepositoryError::OutOfRange(_))
        );
    }

    #[test]
    fn split_note_strips_heading_and_blank_lines() {
        let (title, body) = split_note("# Title\n\n\nline one\nline two");
        assert_eq!(title, "Title");
        assert_eq!(body, "line one\nline two");
        let (title, body) = split_note("");
        assert!(title.is_empty());
        assert!(body.is_empty());
    }
}
