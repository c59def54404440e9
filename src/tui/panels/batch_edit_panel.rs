use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};

use crate::core::model::Category;
use crate::core::state::App;
use crate::tui::event::{Key, KeyPress};
use crate::tui::geometry::{Size, centered, truncate_str};
use crate::tui::panel::{Panel, PanelCx, PanelOptions};
use crate::tui::panels::palette_color;

/// Category rows shown at once.
const LIST_ROWS: usize = 10;
const WIDTH: u16 = 44;
const HINT: &str = "Enter: move  Esc: cancel";

/// Moves every marked sound into one category. Hidden until Alt+E while
/// sounds are marked; the categories are read when it opens.
#[derive(Default)]
pub struct BatchEditPanel {
    categories: Vec<Category>,
    cursor: usize,
}

impl BatchEditPanel {
    fn open(&mut self, cx: &mut PanelCx<'_, App>) {
        match cx.state.library().list_categories() {
            Ok(categories) if !categories.is_empty() => {
                self.categories = categories;
                self.cursor = 0;
                cx.show();
            }
            Ok(_) => {
                cx.state
                    .report("Could not edit selection", &"there are no categories");
            }
            Err(e) => cx.state.report("Could not load categories", &e),
        }
    }

    fn choose(&mut self, index: usize, cx: &mut PanelCx<'_, App>) {
        let Some(category) = self.categories.get(index) else {
            return;
        };
        let id = category.id;
        if let Err(e) = cx.state.move_marked(id) {
            cx.state.report("Could not move sounds", &e);
        }
        cx.hide();
    }

    fn move_cursor(&mut self, delta: isize, cx: &mut PanelCx<'_, App>) {
        let last = self.categories.len().saturating_sub(1);
        let cursor = self.cursor.saturating_add_signed(delta).min(last);
        if cursor != self.cursor {
            self.cursor = cursor;
            cx.redraw(true);
        }
    }
}

impl Panel<App> for BatchEditPanel {
    fn name(&self) -> &'static str {
        "batch-edit"
    }

    fn options(&self) -> PanelOptions {
        PanelOptions {
            z_index: 2,
            border: true,
            popup: true,
            hidden: true,
        }
    }

    /// Heading, a blank line, the category rows, the hint and the border.
    fn placement(&self, parent: Size) -> Rect {
        centered(parent, WIDTH, LIST_ROWS as u16 + 5)
    }

    fn title(&self, state: &App) -> Option<String> {
        Some(format!("Edit {} sounds", state.marked().len()))
    }

    fn render(&mut self, _state: &App, area: Rect, buf: &mut Buffer) {
        let width = area.width as usize;
        buf.set_stringn(area.x, area.y, "Move to category:", width, Style::default());
        let rows = (area.height as usize).saturating_sub(3).min(LIST_ROWS);
        if rows == 0 {
            return;
        }
        let offset = self.cursor.saturating_sub(rows - 1);
        for (row, (index, category)) in self
            .categories
            .iter()
            .enumerate()
            .skip(offset)
            .take(rows)
            .enumerate()
        {
            let mut style = Style::default().fg(palette_color(category.palette));
            if index == self.cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            let label = format!("{index}. {}", category.name);
            buf.set_stringn(
                area.x,
                area.y + 2 + row as u16,
                truncate_str(&label, width),
                width,
                style,
            );
        }
        buf.set_stringn(
            area.x,
            area.bottom() - 1,
            HINT,
            width,
            Style::default().add_modifier(Modifier::DIM),
        );
    }

    /// While visible, every key stops here.
    fn take(&mut self, key: &KeyPress, cx: &mut PanelCx<'_, App>) -> bool {
        if !cx.is_visible() {
            if key.is_alt_char('e') && !cx.popup_open() && !cx.state.marked().is_empty() {
                self.open(cx);
                return true;
            }
            return false;
        }
        match key.key {
            Key::Esc => cx.hide(),
            Key::Up => self.move_cursor(-1, cx),
            Key::Down => self.move_cursor(1, cx),
            Key::Enter => self.choose(self.cursor, cx),
            Key::Char(c) if !key.alt && !key.ctrl => {
                if let Some(digit) = c.to_digit(10) {
                    self.choose(digit as usize, cx);
                }
            }
            _ => {}
        }
        true
    }
}
