use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event as TerminalEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::editor::{self, Editor};
use crate::events::{Continuation, Event, EventQueue};
use crate::repository::{CategorySummary, NoteRepository, RepositoryError};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::ui;

pub mod state;

pub use state::{AppState, Direction, DisplayState, EditorFocus, PlayState, Step};

/// Queue drain cadence. One event per tick keeps per-tick latency bounded
/// and lets pagination and redraw interleave fairly with intent processing.
const TICK_INTERVAL: Duration = Duration::from_millis(100);
/// Spacing between the steps of a scheduled chain.
const STEP_SPACING: Duration = Duration::from_millis(10);
/// Delay before a category switch takes effect, so the menu press settles
/// visually first.
const CATEGORY_SETTLE: Duration = Duration::from_millis(100);

/// The application engine: sole owner of [`AppState`], sole consumer of the
/// event queue. Producers (key input, pagination timer, discovery results)
/// only ever push events; all state transitions happen in the handlers and
/// step executors below.
pub struct App {
    config: Arc<AppConfig>,
    state: AppState,
    repository: Box<dyn NoteRepository>,
    editor: Editor,
    scheduler: Scheduler<Step>,
    events: EventQueue,
    pagination: Option<TimerHandle>,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, repository: Box<dyn NoteRepository>) -> Self {
        let state = AppState::new(config.play_state);
        Self {
            config,
            state,
            repository,
            editor: Editor,
            scheduler: Scheduler::new(),
            events: EventQueue::new(),
            pagination: None,
            should_quit: false,
            tick_rate: TICK_INTERVAL,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn repository(&self) -> &dyn NoteRepository {
        self.repository.as_ref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn has_pagination_timer(&self) -> bool {
        self.pagination
            .as_ref()
            .map(|handle| !handle.is_cancelled())
            .unwrap_or(false)
    }

    /// Producer entry point: append an intent to the back of the queue.
    pub fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Initial discovery. The configured startup category, if any, is
    /// selected once the category list has been populated.
    pub fn bootstrap(&mut self) {
        let on_complete = if self.config.category.is_empty() {
            None
        } else {
            Some(Continuation::SelectCategory(self.config.category.clone()))
        };
        self.run_step(Step::RunDiscovery { on_complete });
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        self.bootstrap();
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| ui::draw_app(frame, &self.state))
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or(Duration::ZERO);

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    TerminalEvent::Key(key) => self.handle_key(key),
                    TerminalEvent::Resize(_, _) => {
                        // next draw adapts to the new size
                    }
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.tick(last_tick.elapsed());
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    /// One cooperative tick: execute the scheduler steps that came due, then
    /// drain at most one event from the queue.
    pub fn tick(&mut self, elapsed: Duration) {
        let steps = self.scheduler.advance(elapsed);
        for step in steps {
            self.run_step(step);
        }
        self.process_next_event();
    }

    fn process_next_event(&mut self) {
        let Some(event) = self.events.pop_front() else {
            return;
        };
        tracing::debug!(event = event.label(), "processing event");
        match event {
            Event::AddNote => self.process_add_note(),
            Event::EditNote { category, index } => self.process_edit_note(&category, index),
            Event::CancelEdit => self.process_cancel_edit(),
            Event::SaveNote { title, text } => self.process_save_note(title, text),
            Event::NoteFetched { note } => {
                // index_size() is scoped to the active category, so only a
                // note from it gets a footer position.
                let is_active = self.state.active_category() == Some(note.category.as_str());
                let position = is_active.then(|| (note.index, self.repository.index_size()));
                self.state.set_note(Some(note));
                self.state.set_note_position(position);
            }
            Event::NotesQuery {
                result,
                on_complete,
            } => self.process_notes_query(result, on_complete),
            Event::RefreshNotes { on_complete } => {
                self.scheduler.schedule_chain(
                    Duration::ZERO,
                    STEP_SPACING,
                    [Step::ClearCategories, Step::RunDiscovery { on_complete }],
                );
            }
            Event::BackButton { display_state } => self.process_back_button(display_state),
        }
    }

    fn process_add_note(&mut self) {
        let Some(category) = self.state.active_category().map(str::to_string) else {
            tracing::warn!("add note requested without an active category");
            self.state
                .set_status(Some("Select a category before adding a note".to_string()));
            return;
        };
        let draft = self.editor.new_note(&category, self.repository.index_size());
        self.state.set_draft(draft);
        self.transition(DisplayState::Add);
    }

    fn process_edit_note(&mut self, category: &str, index: usize) {
        match self.repository.get_note(category, index) {
            Ok(note) => {
                let draft = self.editor.edit_note(&note);
                self.state.set_draft(draft);
                self.transition(DisplayState::Edit);
            }
            Err(err) => {
                tracing::error!(?err, category, index, "failed to load note for editing");
                self.state
                    .set_status(Some("Could not open note for editing".to_string()));
            }
        }
    }

    fn process_cancel_edit(&mut self) {
        self.state.clear_draft();
        self.transition(DisplayState::Display);
    }

    /// The display transition is scheduled ahead of persistence on purpose:
    /// the user sees the kiosk resume immediately and a failed save is
    /// reported afterwards, re-entering the editor with the draft intact.
    fn process_save_note(&mut self, title: String, text: String) {
        let note_is_new = self.state.display_state() == DisplayState::Add;
        let Some(draft) = self.state.draft_mut() else {
            tracing::warn!("save requested without an active draft");
            return;
        };
        draft.text = text;
        if note_is_new {
            draft.title = title;
        }
        self.scheduler.schedule_chain(
            Duration::ZERO,
            STEP_SPACING,
            [Step::EnterDisplay, Step::PersistDraft],
        );
    }

    fn process_notes_query(
        &mut self,
        result: Vec<CategorySummary>,
        on_complete: Option<Continuation>,
    ) {
        // Categories populate one scheduled step at a time.
        let mut steps: Vec<Step> = result
            .into_iter()
            .map(|summary| Step::AppendCategory(summary.category))
            .collect();
        if let Some(continuation) = on_complete {
            steps.push(Step::Continue(continuation));
        }
        self.scheduler
            .schedule_chain(Duration::ZERO, STEP_SPACING, steps);
    }

    fn process_back_button(&mut self, display_state: DisplayState) {
        match display_state {
            DisplayState::Choose => {
                // Nowhere further back to go.
                self.should_quit = true;
            }
            DisplayState::Display => {
                self.scheduler
                    .schedule_once(Duration::ZERO, Step::EnterChoose);
            }
            DisplayState::List => {
                self.scheduler
                    .schedule_once(Duration::ZERO, Step::EnterDisplay);
            }
            DisplayState::Edit | DisplayState::Add => {
                // Routed back through the queue to preserve the
                // single-writer-per-tick discipline.
                self.events.push(Event::CancelEdit);
            }
        }
    }

    fn run_step(&mut self, step: Step) {
        match step {
            Step::SetIndex(n) => {
                if let Err(err) = self.repository.set_index(n) {
                    tracing::error!(?err, n, "failed to jump note index");
                }
            }
            Step::ShowCurrentNote => match self.repository.current_note() {
                Ok(note) => {
                    let position = (note.index, self.repository.index_size());
                    self.state.set_note(Some(note));
                    self.state.set_note_position(Some(position));
                }
                Err(err) => {
                    tracing::warn!(?err, "no current note to show");
                }
            },
            Step::PausePlayback => self.set_play(PlayState::Pause),
            Step::EnterDisplay => {
                self.transition(DisplayState::Display);
                if self.state.play_state() == PlayState::Play && !self.has_pagination_timer() {
                    self.restart_pagination();
                }
            }
            Step::EnterChoose => {
                self.cancel_pagination();
                self.transition(DisplayState::Choose);
            }
            Step::EnterList => {
                self.transition(DisplayState::List);
                if let Some((index, _)) = self.state.note_position() {
                    self.state.set_list_cursor(index);
                }
            }
            Step::PersistDraft => self.persist_draft(),
            Step::ClearDraft => self.state.clear_draft(),
            Step::ClearCategories => self.state.clear_categories(),
            Step::RunDiscovery { on_complete } => match self.repository.discover_notes() {
                Ok(discovered) => {
                    let result: Vec<CategorySummary> =
                        discovered.iter().map(CategorySummary::from).collect();
                    self.events.push(Event::NotesQuery {
                        result,
                        on_complete,
                    });
                }
                Err(err) => {
                    tracing::error!(?err, "note discovery failed");
                    self.state
                        .set_status(Some("Note storage is unavailable".to_string()));
                }
            },
            Step::AppendCategory(category) => self.state.push_category(category),
            Step::ApplyCategory(category) => self.apply_category(&category),
            Step::LeaveCategory => {
                self.state.set_active_category(String::new());
                self.state.set_category_meta(Vec::new());
                self.state.set_note(None);
                self.state.set_note_position(None);
                self.cancel_pagination();
                self.transition(DisplayState::Choose);
            }
            Step::Advance(direction) => self.advance_note(direction),
            Step::Continue(Continuation::SelectCategory(category)) => {
                self.select_category(Some(category));
            }
        }
    }

    /// Category button pressed (or startup continuation). `None` clears the
    /// selection and returns to the menu.
    pub fn select_category(&mut self, category: Option<String>) {
        match category {
            None => {
                if let Err(err) = self.repository.set_current_category(None) {
                    tracing::error!(?err, "failed to clear active category");
                }
                self.scheduler
                    .schedule_once(CATEGORY_SETTLE, Step::LeaveCategory);
            }
            Some(name) => {
                if let Err(err) = self.repository.set_current_category(Some(&name)) {
                    tracing::error!(?err, category = %name, "failed to select category");
                    self.state
                        .set_status(Some(format!("Unknown category '{name}'")));
                    return;
                }
                self.state.set_active_category(name.clone());
                self.scheduler
                    .schedule_once(CATEGORY_SETTLE, Step::ApplyCategory(name));
            }
        }
    }

    fn apply_category(&mut self, category: &str) {
        self.state.set_category_meta(self.repository.category_meta());
        match self.repository.current_note() {
            Ok(note) => {
                let position = (note.index, self.repository.index_size());
                self.state.set_note(Some(note));
                self.state.set_note_position(Some(position));
                self.cancel_pagination();
                if self.state.play_state() == PlayState::Play {
                    self.restart_pagination();
                }
                self.transition(DisplayState::Display);
            }
            Err(RepositoryError::EmptyCategory(name)) => {
                tracing::warn!(category = %name, "selected category has no notes");
                self.state
                    .set_status(Some(format!("No notes in '{name}' yet")));
                self.cancel_pagination();
                self.transition(DisplayState::Choose);
            }
            Err(err) => {
                tracing::error!(?err, category, "failed to show first note");
                self.state
                    .set_status(Some("Could not display category".to_string()));
                self.cancel_pagination();
                self.transition(DisplayState::Choose);
            }
        }
    }

    fn persist_draft(&mut self) {
        let Some(draft) = self.state.draft().cloned() else {
            tracing::warn!("persist step ran without a draft");
            return;
        };
        match self.repository.save_note(&draft) {
            Ok(saved) => {
                let is_active = self.state.active_category() == Some(saved.category.as_str());
                if is_active {
                    self.state.set_category_meta(self.repository.category_meta());
                    let position = (saved.index, self.repository.index_size());
                    self.state.set_note(Some(saved));
                    self.state.set_note_position(Some(position));
                }
                self.state.set_status(Some("Note saved".to_string()));
                self.scheduler.schedule_once(Duration::ZERO, Step::ClearDraft);
            }
            Err(err) => {
                tracing::error!(?err, "failed to persist draft");
                self.state
                    .set_status(Some("Save failed; still editing".to_string()));
                // Keep the draft alive rather than discarding user input.
                self.transition(DisplayState::Edit);
            }
        }
    }

    fn advance_note(&mut self, direction: Direction) {
        if self.state.display_state() != DisplayState::Display {
            return;
        }
        let fetched = match direction {
            Direction::Forward => self.repository.next_note(),
            Direction::Backward => self.repository.previous_note(),
        };
        match fetched {
            Ok(note) => {
                let position = (note.index, self.repository.index_size());
                self.state.set_note(Some(note));
                self.state.set_note_position(Some(position));
            }
            Err(RepositoryError::EmptyCategory(name)) => {
                tracing::debug!(category = %name, "pagination over empty category");
            }
            Err(err) => {
                tracing::error!(?err, "pagination failed");
                self.state
                    .set_status(Some("Could not fetch next note".to_string()));
            }
        }
    }

    /// Manual pagination. Cancels before rescheduling so a user keypress
    /// never races the interval timer into double-advancing.
    pub fn paginate(&mut self, direction: Direction) {
        self.cancel_pagination();
        self.scheduler
            .schedule_once(Duration::ZERO, Step::Advance(direction));
        if self.state.play_state() == PlayState::Play {
            self.restart_pagination();
        }
    }

    /// Jump straight to a note picked from the list view.
    pub fn select_index(&mut self, n: usize) {
        self.scheduler.schedule_chain(
            Duration::ZERO,
            STEP_SPACING,
            [
                Step::SetIndex(n),
                Step::ShowCurrentNote,
                Step::PausePlayback,
                Step::EnterDisplay,
            ],
        );
    }

    pub fn toggle_play(&mut self) {
        let next = match self.state.play_state() {
            PlayState::Play => PlayState::Pause,
            PlayState::Pause => PlayState::Play,
        };
        self.set_play(next);
        self.state.set_status(Some(format!("Pagination: {next}")));
    }

    fn set_play(&mut self, play: PlayState) {
        self.state.set_play_state(play);
        match play {
            PlayState::Pause => self.cancel_pagination(),
            PlayState::Play => self.restart_pagination(),
        }
    }

    fn transition(&mut self, next: DisplayState) {
        if matches!(next, DisplayState::Edit | DisplayState::Add) {
            // Editing must never be interrupted by auto-advance.
            self.state.set_play_state(PlayState::Pause);
            self.cancel_pagination();
        }
        self.state.set_display_state(next);
    }

    fn cancel_pagination(&mut self) {
        if let Some(handle) = self.pagination.take() {
            handle.cancel();
        }
    }

    fn restart_pagination(&mut self) {
        self.cancel_pagination();
        if self.state.active_category().is_none() {
            return;
        }
        let handle = self.scheduler.schedule_interval(
            self.config.paginate_interval(),
            Step::Advance(Direction::Forward),
        );
        self.pagination = Some(handle);
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        if key.code == KeyCode::Esc {
            self.events.push(Event::BackButton {
                display_state: self.state.display_state(),
            });
            return;
        }

        match self.state.display_state() {
            DisplayState::Choose => match key.code {
                KeyCode::Char('j') | KeyCode::Down => self.state.move_menu_cursor(1),
                KeyCode::Char('k') | KeyCode::Up => self.state.move_menu_cursor(-1),
                KeyCode::Enter => {
                    let selected = self
                        .state
                        .categories()
                        .get(self.state.menu_cursor())
                        .cloned();
                    if let Some(category) = selected {
                        self.select_category(Some(category));
                    }
                }
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            },
            DisplayState::Display => match key.code {
                KeyCode::Left => self.paginate(Direction::Backward),
                KeyCode::Right => self.paginate(Direction::Forward),
                KeyCode::Char(' ') => self.toggle_play(),
                KeyCode::Char('l') => {
                    self.scheduler.schedule_once(Duration::ZERO, Step::EnterList);
                }
                KeyCode::Char('a') => self.events.push(Event::AddNote),
                KeyCode::Char('e') => {
                    if let (Some(category), Some((index, _))) = (
                        self.state.active_category().map(str::to_string),
                        self.state.note_position(),
                    ) {
                        self.events.push(Event::EditNote { category, index });
                    }
                }
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            },
            DisplayState::List => match key.code {
                KeyCode::Char('j') | KeyCode::Down => self.state.move_list_cursor(1),
                KeyCode::Char('k') | KeyCode::Up => self.state.move_list_cursor(-1),
                KeyCode::Enter => self.select_index(self.state.list_cursor()),
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            },
            DisplayState::Edit | DisplayState::Add => self.handle_editor_key(key),
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if key.code == KeyCode::Char('s') {
                if let Some(draft) = self.state.draft() {
                    let title = draft.title.clone();
                    let text = draft.text.clone();
                    self.events.push(Event::SaveNote { title, text });
                }
            }
            return;
        }
        let focus = self.state.editor_focus();
        match key.code {
            KeyCode::Tab => self.state.toggle_editor_focus(),
            KeyCode::Enter => match focus {
                EditorFocus::Title => self.state.toggle_editor_focus(),
                EditorFocus::Body => {
                    if let Some(draft) = self.state.draft_mut() {
                        draft.text.push('\n');
                    }
                }
            },
            KeyCode::Backspace => {
                if let Some(draft) = self.state.draft_mut() {
                    match focus {
                        EditorFocus::Title => editor::backspace(&mut draft.title),
                        EditorFocus::Body => editor::backspace(&mut draft.text),
                    }
                }
            }
            KeyCode::Char(ch) => {
                if let Some(draft) = self.state.draft_mut() {
                    match focus {
                        EditorFocus::Title => draft.title.push(ch),
                        EditorFocus::Body => draft.text.push(ch),
                    }
                }
            }
            _ => {}
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}
