use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};

use crate::core::format::format_millis;
use crate::core::state::{App, Change};
use crate::tui::geometry::{Size, place, truncate_str};
use crate::tui::panel::{Panel, PanelCx, PanelId};
use crate::tui::panels::{BAR_HEIGHT, StatusPanel, progress_bar};

/// Oldest messages drop off a status popup past this many.
const MAX_STATUS_MESSAGES: usize = 5;

/// Selected sound details and the aggregate progress of everything playing.
/// Also owns the status popup: reported failures collect in one popup
/// rather than stacking a new one per failure.
#[derive(Default)]
pub struct BottomPanel {
    status: Option<(PanelId, Vec<String>)>,
}

impl BottomPanel {
    fn report(&mut self, message: &str, cx: &mut PanelCx<'_, App>) {
        let mut messages = match self.status.take() {
            Some((id, messages)) if cx.is_alive(id) => {
                cx.detach(id);
                messages
            }
            _ => Vec::new(),
        };
        messages.push(message.to_string());
        if messages.len() > MAX_STATUS_MESSAGES {
            messages.drain(..messages.len() - MAX_STATUS_MESSAGES);
        }
        let id = cx.spawn(Box::new(StatusPanel::new(&messages.join("\n"))));
        self.status = Some((id, messages));
    }
}

fn details(state: &App) -> String {
    let marked = state.marked().len();
    if marked > 0 {
        return format!("{marked} sounds selected  Alt+E: edit selection  Esc: clear");
    }
    match state.selected_sound() {
        Some(sound) => {
            let duration = sound
                .duration_ms
                .map(format_millis)
                .unwrap_or_else(|| "?".to_string());
            format!(
                "{}  {}  played {} times",
                sound.name, duration, sound.play_count
            )
        }
        None => "Enter: play / expand   Alt+S: stop all   Alt+R: re-press mode".to_string(),
    }
}

impl Panel<App> for BottomPanel {
    fn name(&self) -> &'static str {
        "bottom"
    }

    fn placement(&self, parent: Size) -> Rect {
        place(
            parent,
            0,
            parent.height.saturating_sub(BAR_HEIGHT),
            parent.width,
            BAR_HEIGHT,
        )
    }

    fn render(&mut self, state: &App, area: Rect, buf: &mut Buffer) {
        let width = area.width as usize;
        buf.set_stringn(
            area.x,
            area.y,
            truncate_str(&details(state), width),
            width,
            Style::default(),
        );
        if area.height < 2 {
            return;
        }
        let playing = state.engine().active_count();
        let line = match state.total_progress() {
            Some(progress) if playing > 0 => {
                let label = format!(" {:>3.0}% ({playing} playing)", progress * 100.0);
                let bar_width = width.saturating_sub(label.len());
                format!("{}{label}", progress_bar(progress, bar_width))
            }
            _ => String::new(),
        };
        buf.set_stringn(
            area.x,
            area.y + 1,
            line,
            width,
            Style::default().add_modifier(Modifier::BOLD),
        );
    }

    fn on_change(&mut self, change: &Change, cx: &mut PanelCx<'_, App>) {
        match change {
            Change::Selection
            | Change::Groups
            | Change::Progress { .. }
            | Change::Finished { .. }
            | Change::Marks => cx.redraw(true),
            Change::Status(message) => self.report(message, cx),
            Change::Query | Change::RepressMode => {}
        }
    }
}
