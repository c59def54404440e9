use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};

use crate::core::state::{App, Change};
use crate::tui::event::{Key, KeyPress};
use crate::tui::geometry::{Size, place, truncate_str};
use crate::tui::panel::{Panel, PanelCx};
use crate::tui::panels::BAR_HEIGHT;

/// Filter input and mode line.
pub struct TopPanel;

impl Panel<App> for TopPanel {
    fn name(&self) -> &'static str {
        "top"
    }

    fn placement(&self, parent: Size) -> Rect {
        place(parent, 0, 0, parent.width, BAR_HEIGHT)
    }

    fn render(&mut self, state: &App, area: Rect, buf: &mut Buffer) {
        let width = area.width as usize;
        let label = "Filter: ";
        buf.set_stringn(area.x, area.y, label, width, Style::default());
        let query = truncate_str(state.query(), width.saturating_sub(label.len()));
        buf.set_stringn(
            area.x + label.len() as u16,
            area.y,
            query,
            width.saturating_sub(label.len()),
            Style::default().add_modifier(Modifier::BOLD),
        );
        if area.height > 1 {
            let mode = format!(
                "Re-press mode: {}  Help: Alt+H",
                state.repress_mode().label()
            );
            buf.set_stringn(
                area.x,
                area.y + 1,
                truncate_str(&mode, width),
                width,
                Style::default().add_modifier(Modifier::DIM),
            );
        }
    }

    fn take(&mut self, key: &KeyPress, cx: &mut PanelCx<'_, App>) -> bool {
        if cx.popup_open() {
            return false;
        }
        if key.key == Key::Backspace {
            if key.alt {
                cx.state.clear_query();
            } else {
                cx.state.pop_query_char();
            }
            return true;
        }
        match key.printable() {
            Some(c) => cx.state.push_query_char(c),
            None => false,
        }
    }

    fn on_change(&mut self, change: &Change, cx: &mut PanelCx<'_, App>) {
        if matches!(change, Change::Query | Change::RepressMode) {
            cx.redraw(true);
        }
    }
}
