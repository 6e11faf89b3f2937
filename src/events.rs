use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    Tick,
    Quit,
    ToggleExplorer,
    RefreshExplorer,
    OpenVsCode,
    OpenSettings,
    NewConversation,
    EndSession,
    NextField,
    PrevField,
    MoveUp,
    MoveDown,
    InputChar(char),
    Backspace,
    Submit,
    Cancel,
}

fn map_key_event(key_event: KeyEvent) -> AppEvent {
    if key_event.kind != KeyEventKind::Press {
        return AppEvent::Tick;
    }

    if key_event.modifiers.contains(KeyModifiers::CONTROL) {
        return match key_event.code {
            KeyCode::Char('c') | KeyCode::Char('q') => AppEvent::Quit,
            KeyCode::Char('b') => AppEvent::ToggleExplorer,
            KeyCode::Char('r') => AppEvent::RefreshExplorer,
            KeyCode::Char('o') => AppEvent::OpenVsCode,
            KeyCode::Char('s') => AppEvent::OpenSettings,
            KeyCode::Char('n') => AppEvent::NewConversation,
            KeyCode::Char('x') => AppEvent::EndSession,
            _ => AppEvent::Tick,
        };
    }

    match key_event.code {
        KeyCode::Tab => AppEvent::NextField,
        KeyCode::BackTab => AppEvent::PrevField,
        KeyCode::Up => AppEvent::MoveUp,
        KeyCode::Down => AppEvent::MoveDown,
        KeyCode::Backspace => AppEvent::Backspace,
        KeyCode::Enter => AppEvent::Submit,
        KeyCode::Esc => AppEvent::Cancel,
        KeyCode::Char(c) => AppEvent::InputChar(c),
        _ => AppEvent::Tick,
    }
}

pub fn next_event() -> io::Result<AppEvent> {
    if event::poll(Duration::from_millis(16))?
        && let Event::Key(key_event) = event::read()?
    {
        return Ok(map_key_event(key_event));
    }
    Ok(AppEvent::Tick)
}
