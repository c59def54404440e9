//! The scrolling list of categories and sounds.
//!
//! Only the visible window is ever drawn. Selection moves, progress ticks and
//! library changes repaint just the rows they touch and put them on screen
//! with a non-forced redraw.
//!
//! Ctrl+Space starts marking sounds for a batch edit. While any sound is
//! marked, Space and Enter flip the mark on the selected sound and step down
//! instead of typing or playing, and Esc or Ctrl+Space clears every mark.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};

use crate::core::format::format_millis;
use crate::core::model::CategoryWithSounds;
use crate::core::sound_list::{ListItem, SoundList, scrollbar};
use crate::core::state::{App, Change};
use crate::tui::event::{Key, KeyPress};
use crate::tui::geometry::{Size, place, truncate_str};
use crate::tui::panel::{Panel, PanelCx};
use crate::tui::panels::{BAR_HEIGHT, PROGRESS_WIDTH, clear, palette_color, progress_bar};

pub struct SoundPanel {
    list: SoundList,
}

impl SoundPanel {
    pub fn new(groups: &[CategoryWithSounds]) -> Self {
        Self {
            list: SoundList::new(groups),
        }
    }

    pub fn list(&self) -> &SoundList {
        &self.list
    }

    /// Repaint the given absolute indices (those outside the window are
    /// skipped) plus the scrollbar, then queue a partial redraw.
    fn repaint_rows(&self, indices: &[usize], cx: &mut PanelCx<'_, App>) {
        let list = &self.list;
        cx.paint(|state, area, buf| {
            let page = area.height as usize;
            for &index in indices {
                if index < list.offset() || index >= list.offset() + page {
                    continue;
                }
                draw_row(state, list, index, row_rect(area, index - list.offset()), buf);
            }
            draw_scrollbar(list, area, buf);
        });
        cx.redraw(false);
    }

    /// The selected row's sound, `None` on a category header.
    pub fn selected_sound_id(&self) -> Option<i64> {
        self.list
            .selected_item()
            .and_then(ListItem::as_sound)
            .map(|s| s.id)
    }

    /// Repaint every row in the window.
    fn repaint_window(&self, cx: &mut PanelCx<'_, App>) {
        let start = self.list.offset();
        let rows: Vec<usize> = (start..start + page_of(cx)).collect();
        self.repaint_rows(&rows, cx);
    }

    /// Flip the mark on the selected sound and step to the next row.
    /// Returns the rows to repaint; empty on a category header.
    fn mark_and_step(&mut self, cx: &mut PanelCx<'_, App>) -> Vec<usize> {
        let Some(sound_id) = self.selected_sound_id() else {
            return Vec::new();
        };
        cx.state.toggle_mark(sound_id);
        let mut rows = self.list.step_single(1, page_of(cx));
        if let Some(index) = self.list.position_of_sound(sound_id)
            && !rows.contains(&index)
        {
            rows.push(index);
        }
        rows
    }

    /// Keys that only mean something while marking. `None` when `key` is
    /// not one of them.
    fn take_marking(
        &mut self,
        key: &KeyPress,
        cx: &mut PanelCx<'_, App>,
    ) -> Option<Vec<usize>> {
        let marking = !cx.state.marked().is_empty();
        if key.is_ctrl_char(' ') {
            if marking {
                cx.state.clear_marks();
                return Some(Vec::new());
            }
            return Some(self.mark_and_step(cx));
        }
        if !marking || key.alt || key.ctrl {
            return None;
        }
        match key.key {
            Key::Char(' ') | Key::Enter => Some(self.mark_and_step(cx)),
            Key::Esc => {
                cx.state.clear_marks();
                Some(Vec::new())
            }
            _ => None,
        }
    }

    fn sync_selection(&self, cx: &mut PanelCx<'_, App>) {
        cx.state.select(self.selected_sound_id());
    }

    fn activate(&self, cx: &mut PanelCx<'_, App>) {
        match self.list.selected_item() {
            Some(ListItem::Sound(sound)) => {
                let id = sound.id;
                cx.state.activate(id);
            }
            Some(ListItem::Category(category)) => {
                let id = category.id;
                if let Err(e) = cx.state.toggle_category(id) {
                    cx.state.report("Could not update category", &e);
                }
            }
            None => {}
        }
    }
}

fn page_of(cx: &PanelCx<'_, App>) -> usize {
    cx.content_area().height as usize
}

/// Text area of viewport row `row`; the last column belongs to the scrollbar.
fn row_rect(area: Rect, row: usize) -> Rect {
    Rect::new(area.x, area.y + row as u16, area.width.saturating_sub(1), 1)
}

fn draw_row(state: &App, list: &SoundList, index: usize, rect: Rect, buf: &mut Buffer) {
    clear(buf, rect);
    let Some(item) = list.get(index) else {
        return;
    };
    let width = rect.width as usize;
    let selected = list.is_selected(index);
    let mut style = match item {
        ListItem::Category(category) => {
            let style = Style::default().fg(palette_color(category.palette));
            if category.is_expanded {
                style.add_modifier(Modifier::BOLD)
            } else {
                style.add_modifier(Modifier::ITALIC)
            }
        }
        ListItem::Sound(sound) => {
            let style = Style::default().fg(palette_color(sound.palette));
            if state.is_marked(sound.id) {
                style.add_modifier(Modifier::BOLD)
            } else {
                style
            }
        }
    };
    if selected {
        style = style.add_modifier(Modifier::REVERSED);
    }

    match item {
        ListItem::Category(category) => {
            let label = format!(
                "[ {} | {} sounds | {} ]",
                category.name,
                category.sound_count,
                format_millis(category.duration_ms)
            );
            buf.set_stringn(rect.x, rect.y, truncate_str(&label, width), width, style);
        }
        ListItem::Sound(sound) => {
            let progress = state.progress_of(sound.id);
            let bar_width = if progress.is_some() && width > PROGRESS_WIDTH + 8 {
                PROGRESS_WIDTH + 1
            } else {
                0
            };
            let name_width = width - bar_width;
            let prefix = if state.is_marked(sound.id) { " * " } else { "  " };
            let name = truncate_str(&format!("{prefix}{}", sound.name), name_width);
            let padded = format!("{name:<name_width$}");
            buf.set_stringn(rect.x, rect.y, padded, name_width, style);
            if let Some(progress) = progress
                && bar_width > 0
            {
                let x = rect.x + (width - PROGRESS_WIDTH) as u16;
                buf.set_stringn(
                    x,
                    rect.y,
                    progress_bar(progress, PROGRESS_WIDTH),
                    PROGRESS_WIDTH,
                    Style::default().fg(palette_color(sound.palette)),
                );
            }
        }
    }
}

fn draw_scrollbar(list: &SoundList, area: Rect, buf: &mut Buffer) {
    if area.width == 0 {
        return;
    }
    let x = area.right() - 1;
    let column = Rect::new(x, area.y, 1, area.height);
    clear(buf, column);
    let Some(bar) = scrollbar(area.height as usize, list.len(), list.offset()) else {
        return;
    };
    for row in 0..area.height as usize {
        let symbol = if row >= bar.pre && row < bar.pre + bar.bar {
            "█"
        } else {
            "░"
        };
        buf.set_string(x, area.y + row as u16, symbol, Style::default());
    }
}

impl Panel<App> for SoundPanel {
    fn name(&self) -> &'static str {
        "sounds"
    }

    fn placement(&self, parent: Size) -> Rect {
        place(
            parent,
            0,
            BAR_HEIGHT,
            parent.width,
            parent.height.saturating_sub(2 * BAR_HEIGHT),
        )
    }

    fn render(&mut self, state: &App, area: Rect, buf: &mut Buffer) {
        let page = area.height as usize;
        self.list.update_offset(page);
        for row in 0..page {
            draw_row(state, &self.list, self.list.offset() + row, row_rect(area, row), buf);
        }
        draw_scrollbar(&self.list, area, buf);
    }

    fn take(&mut self, key: &KeyPress, cx: &mut PanelCx<'_, App>) -> bool {
        if cx.popup_open() {
            return false;
        }
        if let Some(changed) = self.take_marking(key, cx) {
            if !changed.is_empty() {
                self.repaint_rows(&changed, cx);
                self.sync_selection(cx);
            }
            return true;
        }
        let page = page_of(cx);
        let changed = match key.key {
            Key::Up if !key.alt => self.list.step_single(-1, page),
            Key::Down if !key.alt => self.list.step_single(1, page),
            Key::PageUp => self.list.step_page(-1, page),
            Key::PageDown => self.list.step_page(1, page),
            Key::Home => self.list.select_first(page),
            Key::End => self.list.select_last(page),
            Key::Enter => {
                self.activate(cx);
                return true;
            }
            _ if key.is_alt_char('s') => {
                cx.state.stop_all();
                return true;
            }
            _ => return false,
        };
        if !changed.is_empty() {
            self.repaint_rows(&changed, cx);
            self.sync_selection(cx);
        }
        true
    }

    fn on_change(&mut self, change: &Change, cx: &mut PanelCx<'_, App>) {
        match change {
            Change::Groups => {
                let page = page_of(cx);
                let changed = self.list.rebuild(cx.state.groups(), page);
                self.repaint_rows(&changed, cx);
                self.sync_selection(cx);
            }
            Change::Marks => self.repaint_window(cx),
            Change::Progress { sound_id } | Change::Finished { sound_id } => {
                if let Some(index) = self.list.position_of_sound(*sound_id) {
                    self.repaint_rows(&[index], cx);
                }
            }
            _ => {}
        }
    }
}
