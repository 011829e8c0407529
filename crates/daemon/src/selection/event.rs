//! Events consumed by a selection session.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use protocol::InputEvent;

use super::dispatcher::DispatchReport;

/// Everything that can arrive on a session's event queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// User input.
    Input(InputEvent),
    /// The dispatcher finished with the snapshot it was given.
    TransferComplete(DispatchReport),
}

impl From<InputEvent> for SessionEvent {
    fn from(event: InputEvent) -> Self {
        SessionEvent::Input(event)
    }
}

/// Decode a terminal key press into a session input.
///
/// Returns `None` for keys the session does not bind and for key releases.
pub fn input_for_key(key: KeyEvent) -> Option<InputEvent> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(InputEvent::Quit)
        }
        KeyCode::Char('q') | KeyCode::Esc => Some(InputEvent::Quit),
        KeyCode::Up | KeyCode::Char('k') => Some(InputEvent::MoveUp),
        KeyCode::Down | KeyCode::Char('j') => Some(InputEvent::MoveDown),
        KeyCode::Enter | KeyCode::Char(' ') => Some(InputEvent::ToggleSelect),
        KeyCode::Char('r') => Some(InputEvent::SendTrigger),
        _ => None,
    }
}
