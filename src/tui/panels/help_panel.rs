use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};

use crate::core::state::App;
use crate::tui::event::{Key, KeyPress};
use crate::tui::geometry::{Size, centered};
use crate::tui::panel::{Panel, PanelCx, PanelOptions};

const KEYS: &[(&str, &str)] = &[
    ("Up / Down", "select previous / next"),
    ("PgUp / PgDn", "select by page"),
    ("Home / End", "first / last row"),
    ("Enter", "play sound, expand category"),
    ("Alt+S", "stop all sounds"),
    ("Alt+R", "cycle re-press mode"),
    ("Ctrl+Space", "mark sounds, Space marks more"),
    ("Alt+E", "move marked sounds"),
    ("type", "filter sounds by name"),
    ("Backspace", "delete filter char"),
    ("Alt+Backspace", "clear filter"),
    ("Alt+H", "this help"),
    ("Alt+Q / Ctrl+D", "quit"),
    ("Esc", "close this help"),
];

const KEY_COLUMN: usize = 16;

/// Key reference popup, hidden until Alt+H.
pub struct HelpPanel;

impl Panel<App> for HelpPanel {
    fn name(&self) -> &'static str {
        "help"
    }

    fn options(&self) -> PanelOptions {
        PanelOptions {
            z_index: 2,
            border: true,
            popup: true,
            hidden: true,
        }
    }

    fn placement(&self, parent: Size) -> Rect {
        centered(parent, 50, KEYS.len() as u16 + 2)
    }

    fn title(&self, _state: &App) -> Option<String> {
        Some("Help".to_string())
    }

    fn render(&mut self, _state: &App, area: Rect, buf: &mut Buffer) {
        let width = area.width as usize;
        for (row, (keys, action)) in KEYS.iter().enumerate().take(area.height as usize) {
            let y = area.y + row as u16;
            buf.set_stringn(
                area.x,
                y,
                keys,
                width,
                Style::default().add_modifier(Modifier::BOLD),
            );
            if width > KEY_COLUMN {
                buf.set_stringn(
                    area.x + KEY_COLUMN as u16,
                    y,
                    action,
                    width - KEY_COLUMN,
                    Style::default(),
                );
            }
        }
    }

    /// While visible, every key stops here.
    fn take(&mut self, key: &KeyPress, cx: &mut PanelCx<'_, App>) -> bool {
        if cx.is_visible() {
            if key.key == Key::Esc {
                cx.hide();
            }
            return true;
        }
        if key.is_alt_char('h') && !cx.popup_open() {
            cx.show();
            return true;
        }
        false
    }
}
