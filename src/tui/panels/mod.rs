//! The soundboard's panels and the screen-level shortcuts.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ top bar: filter, repress mode        │  z 0, 2 rows
//! ├──────────────────────────────────────┤
//! │ sound list                          █│  z 0
//! │                                     ░│
//! ├──────────────────────────────────────┤
//! │ bottom bar: selection, total progress│  z 0, 2 rows
//! └──────────────────────────────────────┘
//!   help and batch edit popups (z 2), status popup (z 3)
//! ```

pub mod batch_edit_panel;
pub mod bottom_panel;
pub mod help_panel;
pub mod sound_panel;
pub mod status_panel;
pub mod top_panel;

pub use batch_edit_panel::BatchEditPanel;
pub use bottom_panel::BottomPanel;
pub use help_panel::HelpPanel;
pub use sound_panel::SoundPanel;
pub use status_panel::StatusPanel;
pub use top_panel::TopPanel;

use ratatui::backend::Backend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;

use crate::core::model::Palette;
use crate::core::state::App;
use crate::tui::event::KeyPress;
use crate::tui::panel::ScreenCx;
use crate::tui::screen::Screen;

/// Height of the top and bottom bars.
pub const BAR_HEIGHT: u16 = 2;

/// Cells in a per-sound progress bar.
pub const PROGRESS_WIDTH: usize = 20;

pub fn palette_color(palette: Palette) -> Color {
    match palette {
        Palette::Red => Color::Red,
        Palette::Green => Color::Green,
        Palette::Yellow => Color::Yellow,
        Palette::Blue => Color::Blue,
        Palette::Magenta => Color::Magenta,
        Palette::Cyan => Color::Cyan,
    }
}

/// A `width`-cell bar, filled proportionally to `progress`.
pub fn progress_bar(progress: f64, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(width - filled));
    bar
}

/// Reset every cell of `row` to a blank.
pub(crate) fn clear(buf: &mut Buffer, area: Rect) {
    let area = area.intersection(buf.area);
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            buf[(x, y)].reset();
        }
    }
}

/// Quit, and cycle the repress mode. Refused while a popup is open.
pub fn global_keys(key: &KeyPress, cx: &mut ScreenCx<'_, App>) -> bool {
    if cx.popup_open() {
        return false;
    }
    if key.is_alt_char('q') || key.is_ctrl_char('d') {
        cx.state.stop_all();
        cx.quit();
        return true;
    }
    if key.is_alt_char('r') {
        if let Err(e) = cx.state.cycle_repress_mode() {
            cx.state.report("Could not change repress mode", &e);
        }
        return true;
    }
    false
}

/// Attach the standard panel set.
pub fn attach_all<B: Backend>(screen: &mut Screen<B, App>) {
    screen.attach(Box::new(TopPanel));
    let sounds = SoundPanel::new(screen.state().groups());
    let selected = sounds.selected_sound_id();
    screen.state_mut().select(selected);
    screen.attach(Box::new(sounds));
    screen.attach(Box::new(BottomPanel::default()));
    screen.attach(Box::new(HelpPanel));
    screen.attach(Box::new(BatchEditPanel::default()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0, 4), "░░░░");
        assert_eq!(progress_bar(0.5, 4), "██░░");
        assert_eq!(progress_bar(1.5, 4), "████");
    }
}
