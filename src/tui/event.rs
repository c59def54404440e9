use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Keys the panels care about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Esc,
    Backspace,
    Delete,
    Tab,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Home,
    End,
    F(u8),
}

/// One decoded key press with its modifier state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub alt: bool,
    pub ctrl: bool,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            alt: false,
            ctrl: false,
        }
    }

    pub fn alt(key: Key) -> Self {
        Self {
            key,
            alt: true,
            ctrl: false,
        }
    }

    pub fn ctrl(key: Key) -> Self {
        Self {
            key,
            alt: false,
            ctrl: true,
        }
    }

    /// True for `Alt+<c>` (case-insensitive).
    pub fn is_alt_char(&self, c: char) -> bool {
        self.alt && !self.ctrl && matches!(self.key, Key::Char(k) if k.eq_ignore_ascii_case(&c))
    }

    /// True for `Ctrl+<c>` (case-insensitive).
    pub fn is_ctrl_char(&self, c: char) -> bool {
        self.ctrl && matches!(self.key, Key::Char(k) if k.eq_ignore_ascii_case(&c))
    }

    /// The character to insert for a text field, if this is unmodified text.
    pub fn printable(&self) -> Option<char> {
        match self.key {
            Key::Char(c) if !self.alt && !self.ctrl && !c.is_control() => Some(c),
            _ => None,
        }
    }
}

/// TUI-specific input events
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TuiEvent {
    Key(KeyPress),
    /// Terminal resized to (columns, rows).
    Resize(u16, u16),
}

/// Where the compositor reads input from.
pub trait EventSource {
    /// Wait up to `timeout` for the next event.
    fn next_event(&mut self, timeout: Duration) -> io::Result<Option<TuiEvent>>;
}

/// Reads the real terminal through crossterm.
pub struct CrosstermEvents;

impl EventSource for CrosstermEvents {
    fn next_event(&mut self, timeout: Duration) -> io::Result<Option<TuiEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        Ok(decode(event::read()?))
    }
}

/// Translate a crossterm event. Key releases and repeats-as-release are dropped.
pub fn decode(event: Event) -> Option<TuiEvent> {
    match event {
        Event::Key(key_event) => {
            log::debug!(
                "Key event: {:?} with modifiers {:?}",
                key_event.code,
                key_event.modifiers
            );
            decode_key(key_event).map(TuiEvent::Key)
        }
        Event::Resize(cols, rows) => Some(TuiEvent::Resize(cols, rows)),
        _ => None,
    }
}

fn decode_key(key_event: KeyEvent) -> Option<KeyPress> {
    if key_event.kind == KeyEventKind::Release {
        return None;
    }
    let key = match key_event.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Tab => Key::Tab,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::F(n) => Key::F(n),
        _ => return None,
    };
    Some(KeyPress {
        key,
        alt: key_event.modifiers.contains(KeyModifiers::ALT),
        ctrl: key_event.modifiers.contains(KeyModifiers::CONTROL),
    })
}

/// A fixed list of events, for driving the compositor in tests.
///
/// Once the script runs out, `next_event` fails with `UnexpectedEof` so a
/// loop that never quits cannot hang.
#[derive(Debug, Default)]
pub struct ScriptedEvents {
    queue: VecDeque<TuiEvent>,
}

impl ScriptedEvents {
    pub fn new(events: impl IntoIterator<Item = TuiEvent>) -> Self {
        Self {
            queue: events.into_iter().collect(),
        }
    }

    pub fn keys(keys: impl IntoIterator<Item = KeyPress>) -> Self {
        Self::new(keys.into_iter().map(TuiEvent::Key))
    }

    pub fn push(&mut self, event: TuiEvent) {
        self.queue.push_back(event);
    }
}

impl EventSource for ScriptedEvents {
    fn next_event(&mut self, _timeout: Duration) -> io::Result<Option<TuiEvent>> {
        match self.queue.pop_front() {
            Some(event) => Ok(Some(event)),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "event script exhausted",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn test_decodes_alt_and_ctrl() {
        let alt_q = decode(key(KeyCode::Char('q'), KeyModifiers::ALT)).unwrap();
        assert_eq!(alt_q, TuiEvent::Key(KeyPress::alt(Key::Char('q'))));

        let TuiEvent::Key(ctrl_d) = decode(key(KeyCode::Char('d'), KeyModifiers::CONTROL)).unwrap()
        else {
            panic!("expected a key");
        };
        assert!(ctrl_d.is_ctrl_char('d'));
        assert_eq!(ctrl_d.printable(), None);
    }

    #[test]
    fn test_decodes_resize() {
        assert_eq!(decode(Event::Resize(100, 40)), Some(TuiEvent::Resize(100, 40)));
    }

    #[test]
    fn test_release_is_dropped() {
        let mut release = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(decode(Event::Key(release)), None);
    }

    #[test]
    fn test_printable() {
        assert_eq!(KeyPress::plain(Key::Char('x')).printable(), Some('x'));
        assert_eq!(KeyPress::plain(Key::Char(' ')).printable(), Some(' '));
        assert_eq!(KeyPress::alt(Key::Char('x')).printable(), None);
        assert_eq!(KeyPress::plain(Key::Enter).printable(), None);
    }

    #[test]
    fn test_alt_char_ignores_case() {
        assert!(KeyPress::alt(Key::Char('H')).is_alt_char('h'));
        assert!(!KeyPress::plain(Key::Char('h')).is_alt_char('h'));
    }

    #[test]
    fn test_script_exhaustion_is_an_error() {
        let mut script = ScriptedEvents::keys([KeyPress::plain(Key::Enter)]);
        assert!(script.next_event(Duration::ZERO).unwrap().is_some());
        let err = script.next_event(Duration::ZERO).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
