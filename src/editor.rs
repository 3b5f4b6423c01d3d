use unicode_segmentation::UnicodeSegmentation;

/// An in-progress, unsaved note. `index` is `None` while the note has no
/// slot in its category yet; the repository assigns one on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftNote {
    pub category: String,
    pub index: Option<usize>,
    pub title: String,
    pub text: String,
}

impl DraftNote {
    pub fn is_new(&self) -> bool {
        self.index.is_none()
    }
}

/// Editor capability: produces drafts for the state machine. Opaque to the
/// core beyond yielding a [`DraftNote`] with `title`/`text` fields.
#[derive(Debug, Default)]
pub struct Editor;

impl Editor {
    /// Fresh draft scoped to a category. `idx` is the category's current note
    /// count, used only to suggest a title.
    pub fn new_note(&self, category: &str, idx: usize) -> DraftNote {
        DraftNote {
            category: category.to_string(),
            index: None,
            title: format!("Note {}", idx + 1),
            text: String::new(),
        }
    }

    pub fn edit_note(&self, note: &crate::repository::Note) -> DraftNote {
        DraftNote {
            category: note.category.clone(),
            index: Some(note.index),
            title: note.title.clone(),
            text: note.text.clone(),
        }
    }
}

/// Remove the final grapheme cluster, so multi-byte input deletes as one
/// keystroke.
pub fn backspace(buffer: &mut String) {
    let boundary = buffer
        .grapheme_indices(true)
        .last()
        .map(|(offset, _)| offset)
        .unwrap_or(0);
    buffer.truncate(boundary);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_note_drafts_have_no_slot() {
        let draft = Editor.new_note("Work", 3);
        assert!(draft.is_new());
        assert_eq!(draft.category, "Work");
        assert_eq!(draft.title, "Note 4");
        assert!(draft.text.is_empty());
    }

    #[test]
    fn backspace_removes_whole_graphemes() {
        let mut buffer = String::from("ab\u{1F600}");
        backspace(&mut buffer);
        assert_eq!(buffer, "ab");
        backspace(&mut buffer);
        backspace(&mut buffer);
        backspace(&mut buffer);
        assert!(buffer.is_empty());
    }
}
