use std::collections::VecDeque;

use crate::app::state::DisplayState;
use crate::repository::{CategorySummary, Note};

/// Named follow-up to run once a multi-step flow finishes. A closed set
/// rather than a callback, so every continuation is auditable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    SelectCategory(String),
}

/// Intent/result events consumed by the state machine. Each variant carries
/// exactly the data its handler needs and is immutable once constructed.
#[derive(Debug, Clone)]
pub enum Event {
    AddNote,
    EditNote {
        category: String,
        index: usize,
    },
    CancelEdit,
    SaveNote {
        title: String,
        text: String,
    },
    NoteFetched {
        note: Note,
    },
    NotesQuery {
        result: Vec<CategorySummary>,
        on_complete: Option<Continuation>,
    },
    RefreshNotes {
        on_complete: Option<Continuation>,
    },
    /// Carries the display state at the moment the button was pressed, not at
    /// the moment the event is drained.
    BackButton {
        display_state: DisplayState,
    },
}

impl Event {
    pub fn label(&self) -> &'static str {
        match self {
            Event::AddNote => "add_note",
            Event::EditNote { .. } => "edit_note",
            Event::CancelEdit => "cancel_edit",
            Event::SaveNote { .. } => "save_note",
            Event::NoteFetched { .. } => "note_fetched",
            Event::NotesQuery { .. } => "notes_query",
            Event::RefreshNotes { .. } => "refresh_notes",
            Event::BackButton { .. } => "back_button",
        }
    }
}

/// Unbounded FIFO intent buffer. Producers only ever `push`; the state
/// machine is the sole consumer and drains at most one event per tick, so
/// per-tick latency stays bounded and periodic work interleaves fairly.
/// Strict arrival order, no priorities, no de-duplication.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn pop_front(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_arrival_order() {
        let mut queue = EventQueue::new();
        queue.push(Event::AddNote);
        queue.push(Event::CancelEdit);
        queue.push(Event::BackButton {
            display_state: DisplayState::Display,
        });

        assert_eq!(queue.len(), 3);
        assert!(matches!(queue.pop_front(), Some(Event::AddNote)));
        assert!(matches!(queue.pop_front(), Some(Event::CancelEdit)));
        assert!(matches!(
            queue.pop_front(),
            Some(Event::BackButton { .. })
        ));
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn pushes_during_drain_go_to_the_back() {
        let mut queue = EventQueue::new();
        queue.push(Event::AddNote);
        queue.push(Event::CancelEdit);

        assert!(matches!(queue.pop_front(), Some(Event::AddNote)));
        // A producer fires between drain ticks.
        queue.push(Event::SaveNote {
            title: "T".to_string(),
            text: "hi".to_string(),
        });
        assert!(matches!(queue.pop_front(), Some(Event::CancelEdit)));
        assert!(matches!(queue.pop_front(), Some(Event::SaveNote { .. })));
    }
}
