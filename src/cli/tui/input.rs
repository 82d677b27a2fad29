//! Input handling for the TUI.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::app::Action;

/// Convert a crossterm key event to an Action.
pub fn handle_key_event(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Esc => Some(Action::Back),
        KeyCode::Up | KeyCode::Char('k') => Some(Action::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::Down),
        KeyCode::Char('s') => Some(Action::Start),
        KeyCode::Char('x') => Some(Action::Cancel),
        KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
        KeyCode::Char('e') => Some(Action::Errors),
        KeyCode::Char('p') => Some(Action::Processed),
        _ => None,
    }
}

/// Convert a crossterm Event to an Action. Key releases are ignored.
pub fn handle_event(event: Event) -> Option<Action> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => handle_key_event(key),
        _ => None,
    }
}
