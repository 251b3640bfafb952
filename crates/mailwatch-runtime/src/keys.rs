//! Keyboard command router: translates raw key events into high-level
//! inbox commands. Pure mapping, composed only at the runtime boundary.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxCommand {
    NextMessage,
    PrevMessage,
    OpenSelected,
    FollowLink,
    ToggleStar,
    ToggleRead,
    Delete,
    Refresh,
    Quit,
}

/// Map a key event to an inbox command; `None` for unbound keys and
/// non-press events.
pub fn route_key(event: &KeyEvent) -> Option<InboxCommand> {
    if event.kind != KeyEventKind::Press {
        return None;
    }
    if event.modifiers.contains(KeyModifiers::CONTROL) {
        return match event.code {
            KeyCode::Char('c') => Some(InboxCommand::Quit),
            _ => None,
        };
    }
    match event.code {
        KeyCode::Char('j') | KeyCode::Down => Some(InboxCommand::NextMessage),
        KeyCode::Char('k') | KeyCode::Up => Some(InboxCommand::PrevMessage),
        KeyCode::Enter => Some(InboxCommand::OpenSelected),
        KeyCode::Char('l') => Some(InboxCommand::FollowLink),
        KeyCode::Char('s') => Some(InboxCommand::ToggleStar),
        KeyCode::Char('r') => Some(InboxCommand::ToggleRead),
        KeyCode::Char('d') => Some(InboxCommand::Delete),
        KeyCode::Char('g') => Some(InboxCommand::Refresh),
        KeyCode::Char('q') | KeyCode::Esc => Some(InboxCommand::Quit),
        _ => None,
    }
}
