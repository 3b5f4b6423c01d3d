use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use time::macros::format_description;
use unicode_width::UnicodeWidthStr;

use crate::app::{AppState, DisplayState, EditorFocus, PlayState};

pub fn draw_app(frame: &mut Frame, state: &AppState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(frame.size());

    match state.display_state() {
        DisplayState::Choose => draw_choose(frame, state, vertical[0]),
        DisplayState::Display => draw_display(frame, state, vertical[0]),
        DisplayState::List => draw_list(frame, state, vertical[0]),
        DisplayState::Edit | DisplayState::Add => draw_editor(frame, state, vertical[0]),
    }

    draw_footer(frame, state, vertical[1]);
}

fn draw_choose(frame: &mut Frame, state: &AppState, area: Rect) {
    let mut items: Vec<ListItem> = state
        .categories()
        .iter()
        .map(|category| ListItem::new(category.as_str()))
        .collect();
    if items.is_empty() {
        items.push(ListItem::new("No categories found in the note tree."));
    }

    let list = List::new(items)
        .block(Block::default().title("Categories").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");

    let mut list_state = ListState::default();
    if !state.categories().is_empty() {
        list_state.select(Some(state.menu_cursor()));
    }
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn draw_display(frame: &mut Frame, state: &AppState, area: Rect) {
    let Some(note) = state.note() else {
        let placeholder = Paragraph::new("No note to display.")
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(placeholder, area);
        return;
    };

    let date_format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    let modified = note
        .modified_at
        .format(&date_format)
        .unwrap_or_else(|_| String::new());

    let title = truncate_to_width(&note.title, area.width.saturating_sub(4) as usize);
    let body = Paragraph::new(note.text.as_str())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(Line::from(vec![
                    Span::styled(title, Style::default().add_modifier(Modifier::BOLD)),
                    Span::styled(format!("  {modified}"), Style::default().fg(Color::Gray)),
                ]))
                .borders(Borders::ALL),
        );
    frame.render_widget(body, area);
}

fn draw_list(frame: &mut Frame, state: &AppState, area: Rect) {
    let mut items: Vec<ListItem> = state
        .category_meta()
        .iter()
        .map(|meta| ListItem::new(format!("{:>3}  {}", meta.index + 1, meta.title)))
        .collect();
    if items.is_empty() {
        items.push(ListItem::new("This category has no notes."));
    }

    let title = state
        .active_category()
        .map(|category| format!("Notes — {category}"))
        .unwrap_or_else(|| "Notes".to_string());
    let list = List::new(items)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");

    let mut list_state = ListState::default();
    if !state.category_meta().is_empty() {
        list_state.select(Some(state.list_cursor()));
    }
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn draw_editor(frame: &mut Frame, state: &AppState, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let Some(draft) = state.draft() else {
        let placeholder =
            Paragraph::new("No draft open.").block(Block::default().borders(Borders::ALL));
        frame.render_widget(placeholder, area);
        return;
    };

    let focused = Style::default().fg(Color::Cyan);
    let (title_style, body_style) = match state.editor_focus() {
        EditorFocus::Title => (focused, Style::default()),
        EditorFocus::Body => (Style::default(), focused),
    };

    let heading = if state.display_state() == DisplayState::Add {
        "New note"
    } else {
        "Edit note"
    };

    let title_field = Paragraph::new(draft.title.as_str()).block(
        Block::default()
            .title(heading)
            .borders(Borders::ALL)
            .border_style(title_style),
    );
    frame.render_widget(title_field, rows[0]);

    let body_field = Paragraph::new(draft.text.as_str())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Body (Tab switches field, Ctrl-s saves, Esc cancels)")
                .borders(Borders::ALL)
                .border_style(body_style),
        );
    frame.render_widget(body_field, rows[1]);
}

fn draw_footer(frame: &mut Frame, state: &AppState, area: Rect) {
    let line = if let Some(status) = state.status() {
        Line::from(Span::styled(
            status.to_string(),
            Style::default().fg(Color::Yellow),
        ))
    } else {
        let mut spans = Vec::new();
        if let Some(category) = state.active_category() {
            spans.push(Span::styled(
                category.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(" • "));
        }
        let play_style = match state.play_state() {
            PlayState::Play => Style::default().fg(Color::Green),
            PlayState::Pause => Style::default().fg(Color::Gray),
        };
        spans.push(Span::styled(state.play_state().to_string(), play_style));
        if let Some((current, size)) = state.note_position() {
            spans.push(Span::raw(format!(" • {}/{}", current + 1, size)));
        }
        spans.push(Span::styled(
            "  (←/→ page, space play/pause, l list, a add, e edit, Esc back)",
            Style::default().fg(Color::Gray),
        ));
        Line::from(spans)
    };

    let footer = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}

/// Cut a string down so its display width fits the available columns.
fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    for ch in text.chars() {
        if out.width() + ch.to_string().width() + 1 > max_width {
            break;
        }
        out.push(ch);
    }
    out.push('…');
    out
}
