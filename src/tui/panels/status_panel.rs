use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};

use crate::core::state::App;
use crate::tui::event::{Key, KeyPress};
use crate::tui::geometry::{Size, centered};
use crate::tui::panel::{Panel, PanelCx, PanelOptions};

const WRAP_WIDTH: usize = 56;
const WIDTH: u16 = 60;
const DISMISS: &str = "Enter / Esc to close";

/// One-off message popup. Detaches itself when dismissed.
pub struct StatusPanel {
    lines: Vec<String>,
}

impl StatusPanel {
    pub fn new(message: &str) -> Self {
        let lines = textwrap::wrap(message, WRAP_WIDTH)
            .into_iter()
            .map(|line| line.into_owned())
            .collect();
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl Panel<App> for StatusPanel {
    fn name(&self) -> &'static str {
        "status"
    }

    fn options(&self) -> PanelOptions {
        PanelOptions {
            z_index: 3,
            border: true,
            popup: true,
            hidden: false,
        }
    }

    /// Message, a blank line, the dismiss hint, and the border.
    fn placement(&self, parent: Size) -> Rect {
        centered(parent, WIDTH, self.lines.len() as u16 + 4)
    }

    fn title(&self, _state: &App) -> Option<String> {
        Some("Status".to_string())
    }

    fn render(&mut self, _state: &App, area: Rect, buf: &mut Buffer) {
        let x = area.x + 1;
        let width = area.width.saturating_sub(2) as usize;
        for (row, line) in self.lines.iter().enumerate().take(area.height as usize) {
            buf.set_stringn(x, area.y + row as u16, line, width, Style::default());
        }
        if area.height as usize > self.lines.len() + 1 {
            buf.set_stringn(
                x,
                area.bottom() - 1,
                DISMISS,
                width,
                Style::default().add_modifier(Modifier::DIM),
            );
        }
    }

    fn take(&mut self, key: &KeyPress, cx: &mut PanelCx<'_, App>) -> bool {
        if matches!(key.key, Key::Esc | Key::Enter) {
            let id = cx.id();
            cx.detach(id);
        }
        true
    }
}
