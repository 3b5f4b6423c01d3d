use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::editor::DraftNote;
use crate::events::Continuation;
use crate::repository::{Note, NoteMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DisplayState {
    /// Category menu.
    Choose,
    /// Cycling through the notes of the active category.
    Display,
    /// Note list for the active category.
    List,
    Edit,
    Add,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Play,
    Pause,
}

/// Pagination direction. Only the direction matters, so this is an enum
/// rather than a sign-carrying number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorFocus {
    Title,
    Body,
}

/// Named micro-task executed by the engine's tick. Handlers sequence
/// UI-visible transitions around repository calls by scheduling ordered
/// chains of these instead of closure chains.
#[derive(Debug, Clone)]
pub enum Step {
    SetIndex(usize),
    ShowCurrentNote,
    PausePlayback,
    EnterDisplay,
    EnterChoose,
    EnterList,
    PersistDraft,
    ClearDraft,
    ClearCategories,
    RunDiscovery { on_complete: Option<Continuation> },
    AppendCategory(String),
    ApplyCategory(String),
    LeaveCategory,
    Advance(Direction),
    Continue(Continuation),
}

/// The state machine's owned data. Fields are private on purpose: every
/// transition goes through the engine's event and step handlers, never
/// through external assignment.
#[derive(Debug)]
pub struct AppState {
    display_state: DisplayState,
    play_state: PlayState,
    categories: Vec<String>,
    active_category: String,
    category_meta: Vec<NoteMeta>,
    note: Option<Note>,
    note_position: Option<(usize, usize)>,
    draft: Option<DraftNote>,
    editor_focus: EditorFocus,
    menu_cursor: usize,
    list_cursor: usize,
    status: Option<String>,
}

impl AppState {
    pub fn new(initial_play: PlayState) -> Self {
        Self {
            display_state: DisplayState::Choose,
            play_state: initial_play,
            categories: Vec::new(),
            active_category: String::new(),
            category_meta: Vec::new(),
            note: None,
            note_position: None,
            draft: None,
            editor_focus: EditorFocus::Body,
            menu_cursor: 0,
            list_cursor: 0,
            status: None,
        }
    }

    pub fn display_state(&self) -> DisplayState {
        self.display_state
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn active_category(&self) -> Option<&str> {
        if self.active_category.is_empty() {
            None
        } else {
            Some(&self.active_category)
        }
    }

    pub fn category_meta(&self) -> &[NoteMeta] {
        &self.category_meta
    }

    pub fn note(&self) -> Option<&Note> {
        self.note.as_ref()
    }

    /// `(current, size)` within the active category, for the footer.
    pub fn note_position(&self) -> Option<(usize, usize)> {
        self.note_position
    }

    pub fn draft(&self) -> Option<&DraftNote> {
        self.draft.as_ref()
    }

    pub fn editor_focus(&self) -> EditorFocus {
        self.editor_focus
    }

    pub fn menu_cursor(&self) -> usize {
        self.menu_cursor
    }

    pub fn list_cursor(&self) -> usize {
        self.list_cursor
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub(crate) fn set_display_state(&mut self, next: DisplayState) {
        self.display_state = next;
    }

    pub(crate) fn set_play_state(&mut self, next: PlayState) {
        self.play_state = next;
    }

    pub(crate) fn clear_categories(&mut self) {
        self.categories.clear();
        self.menu_cursor = 0;
    }

    pub(crate) fn push_category(&mut self, category: String) {
        self.categories.push(category);
    }

    pub(crate) fn set_active_category(&mut self, category: String) {
        self.active_category = category;
    }

    pub(crate) fn set_category_meta(&mut self, meta: Vec<NoteMeta>) {
        self.category_meta = meta;
        if self.list_cursor >= self.category_meta.len() {
            self.list_cursor = 0;
        }
    }

    pub(crate) fn set_note(&mut self, note: Option<Note>) {
        self.note = note;
    }

    pub(crate) fn set_note_position(&mut self, position: Option<(usize, usize)>) {
        self.note_position = position;
    }

    pub(crate) fn set_draft(&mut self, draft: DraftNote) {
        self.editor_focus = if draft.is_new() {
            EditorFocus::Title
        } else {
            EditorFocus::Body
        };
        self.draft = Some(draft);
    }

    pub(crate) fn draft_mut(&mut self) -> Option<&mut DraftNote> {
        self.draft.as_mut()
    }

    pub(crate) fn clear_draft(&mut self) {
        self.draft = None;
        self.editor_focus = EditorFocus::Body;
    }

    pub(crate) fn toggle_editor_focus(&mut self) {
        self.editor_focus = match self.editor_focus {
            EditorFocus::Title => EditorFocus::Body,
            EditorFocus::Body => EditorFocus::Title,
        };
    }

    pub(crate) fn move_menu_cursor(&mut self, delta: isize) {
        self.menu_cursor = step_cursor(self.menu_cursor, delta, self.categories.len());
    }

    pub(crate) fn move_list_cursor(&mut self, delta: isize) {
        self.list_cursor = step_cursor(self.list_cursor, delta, self.category_meta.len());
    }

    pub(crate) fn set_list_cursor(&mut self, cursor: usize) {
        if cursor < self.category_meta.len() {
            self.list_cursor = cursor;
        }
    }

    pub(crate) fn set_status(&mut self, status: Option<String>) {
        self.status = status;
    }
}

fn step_cursor(cursor: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = cursor as isize + delta;
    next.clamp(0, len as isize - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_category_empty_string_reads_as_none() {
        let mut state = AppState::new(PlayState::Play);
        assert_eq!(state.active_category(), None);
        state.set_active_category("Work".to_string());
        assert_eq!(state.active_category(), Some("Work"));
        state.set_active_category(String::new());
        assert_eq!(state.active_category(), None);
    }

    #[test]
    fn cursors_clamp_to_bounds() {
        let mut state = AppState::new(PlayState::Play);
        state.push_category("A".to_string());
        state.push_category("B".to_string());
        state.move_menu_cursor(-1);
        assert_eq!(state.menu_cursor(), 0);
        state.move_menu_cursor(5);
        assert_eq!(state.menu_cursor(), 1);
    }

    #[test]
    fn new_drafts_focus_the_title_field() {
        let mut state = AppState::new(PlayState::Play);
        state.set_draft(DraftNote {
            category: "Work".to_string(),
            index: None,
            title: "Note 1".to_string(),
            text: String::new(),
        });
        assert_eq!(state.editor_focus(), EditorFocus::Title);
        state.toggle_editor_focus();
        assert_eq!(state.editor_focus(), EditorFocus::Body);
    }
}
