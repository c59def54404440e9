//! # Panel Contract
//!
//! A [`Panel`] is a rectangular, z-ordered region of the terminal that can be
//! shown and hidden. The compositor ([`Screen`](super::screen::Screen)) owns
//! every panel and its backing buffer; a panel only ever reaches the
//! compositor through the context handed to its callbacks:
//!
//! - [`PanelCx`]: passed to `take` and `on_change`. Knows which panel it
//!   belongs to, so `cx.show()`, `cx.redraw(false)` etc. act on the caller.
//! - [`ScreenCx`]: the same operations addressed by [`PanelId`], plus quit,
//!   spawn and detach. Used by the screen-level key handler and reachable
//!   from a `PanelCx` through `Deref`.
//!
//! ```text
//!             attach           show
//!  Detached ─────────▶ Hidden ◀────▶ Visible
//!     ▲                  │     hide
//!     └──── detach ──────┘
//! ```
//!
//! Visibility and z-order changes apply immediately, so `is_visible` always
//! reflects the last `show`/`hide`. Drawing is deferred: operations queue
//! damage that the screen flushes once per loop iteration.

use std::ops::{Deref, DerefMut};

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

use crate::tui::event::KeyPress;
use crate::tui::geometry::Size;
use crate::tui::screen::Stack;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PanelId(pub(crate) u32);

/// Static properties a panel is attached with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelOptions {
    pub z_index: i32,
    /// Draw a box (and title) around the content area.
    pub border: bool,
    /// While visible, other panels refuse shortcut input.
    pub popup: bool,
    /// Attach in the Hidden state.
    pub hidden: bool,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            z_index: 0,
            border: false,
            popup: false,
            hidden: false,
        }
    }
}

/// Application state driven by the screen.
pub trait Model {
    /// A typed description of what changed, broadcast to every panel.
    type Change: std::fmt::Debug;

    /// Collect changes that happened outside the input path (background
    /// workers, store notifications). Called once per loop iteration.
    fn poll_changes(&mut self, changes: &mut Vec<Self::Change>);

    /// Called once when the loop ends.
    fn shutdown(&mut self) {}
}

pub trait Panel<S: Model> {
    /// Used in log messages.
    fn name(&self) -> &'static str;

    fn options(&self) -> PanelOptions {
        PanelOptions::default()
    }

    /// Region for a terminal of size `parent`. Evaluated on attach and resize.
    fn placement(&self, parent: Size) -> Rect;

    /// Shown in the top border of bordered panels.
    fn title(&self, _state: &S) -> Option<String> {
        None
    }

    /// Full repaint of the content area (inside the border, if any). The
    /// buffer has been cleared and the border drawn already.
    fn render(&mut self, state: &S, area: Rect, buf: &mut Buffer);

    /// Offer a key press. Return true to consume it.
    fn take(&mut self, _key: &KeyPress, _cx: &mut PanelCx<'_, S>) -> bool {
        false
    }

    /// React to a state change, typically by repainting part of the panel.
    fn on_change(&mut self, _change: &S::Change, _cx: &mut PanelCx<'_, S>) {}
}

/// Panels and quit requested during a callback, applied by the screen
/// once the callback returns.
pub(crate) struct Requests<S: Model> {
    pub(crate) spawned: Vec<(PanelId, Box<dyn Panel<S>>)>,
    pub(crate) detached: Vec<PanelId>,
    pub(crate) quit: bool,
}

impl<S: Model> Default for Requests<S> {
    fn default() -> Self {
        Self {
            spawned: Vec::new(),
            detached: Vec::new(),
            quit: false,
        }
    }
}

pub struct ScreenCx<'a, S: Model> {
    pub state: &'a mut S,
    pub(crate) stack: &'a mut Stack,
    pub(crate) changes: &'a mut Vec<S::Change>,
    pub(crate) requests: &'a mut Requests<S>,
}

impl<S: Model> ScreenCx<'_, S> {
    pub fn size(&self) -> Size {
        self.stack.size()
    }

    /// Is any popup panel currently visible?
    pub fn popup_open(&self) -> bool {
        self.stack.popup_open()
    }

    /// Broadcast a change to all panels after this callback.
    pub fn emit(&mut self, change: S::Change) {
        self.changes.push(change);
    }

    /// Attach a new panel after this callback returns.
    pub fn spawn(&mut self, panel: Box<dyn Panel<S>>) -> PanelId {
        let id = self.stack.allocate_id();
        self.requests.spawned.push((id, panel));
        id
    }

    /// Remove a panel from the screen after this callback returns.
    pub fn detach(&mut self, id: PanelId) {
        self.stack.hide(id);
        self.requests.detached.push(id);
    }

    /// True from `spawn` until `detach`, including the stretch before the
    /// screen has applied either request.
    pub fn is_alive(&self, id: PanelId) -> bool {
        let pending = self.requests.spawned.iter().any(|(pid, _)| *pid == id);
        (pending || self.stack.contains(id)) && !self.requests.detached.contains(&id)
    }

    pub fn quit(&mut self) {
        self.requests.quit = true;
    }

    pub fn show_panel(&mut self, id: PanelId) {
        self.stack.show(id);
    }

    pub fn hide_panel(&mut self, id: PanelId) {
        self.stack.hide(id);
    }

    pub fn redraw_panel(&mut self, id: PanelId, force: bool) {
        self.stack.redraw(id, force);
    }

    pub fn move_panel_to_top(&mut self, id: PanelId) {
        self.stack.move_to_top(id);
    }

    pub fn move_panel_to_bottom(&mut self, id: PanelId) {
        self.stack.move_to_bottom(id);
    }

    pub fn is_panel_visible(&self, id: PanelId) -> bool {
        self.stack.is_visible(id)
    }

    pub fn stack(&self) -> &Stack {
        self.stack
    }
}

pub struct PanelCx<'a, S: Model> {
    pub(crate) id: PanelId,
    pub(crate) cx: ScreenCx<'a, S>,
}

impl<'a, S: Model> Deref for PanelCx<'a, S> {
    type Target = ScreenCx<'a, S>;

    fn deref(&self) -> &Self::Target {
        &self.cx
    }
}

impl<S: Model> DerefMut for PanelCx<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.cx
    }
}

impl<S: Model> PanelCx<'_, S> {
    pub fn id(&self) -> PanelId {
        self.id
    }

    pub fn show(&mut self) {
        self.cx.stack.show(self.id);
    }

    pub fn hide(&mut self) {
        self.cx.stack.hide(self.id);
    }

    pub fn is_visible(&self) -> bool {
        self.cx.stack.is_visible(self.id)
    }

    /// `force` repaints the whole panel; otherwise only what was painted
    /// through [`paint`](Self::paint) since the last flush is put on screen.
    pub fn redraw(&mut self, force: bool) {
        self.cx.stack.redraw(self.id, force);
    }

    pub fn move_to_top(&mut self) {
        self.cx.stack.move_to_top(self.id);
    }

    pub fn move_to_bottom(&mut self) {
        self.cx.stack.move_to_bottom(self.id);
    }

    pub fn set_z_index(&mut self, z_index: i32) {
        self.cx.stack.set_z_index(self.id, z_index);
    }

    pub fn z_index(&self) -> Option<i32> {
        self.cx.stack.z_index(self.id)
    }

    /// Content area (inside the border) of this panel.
    pub fn content_area(&self) -> Rect {
        self.cx.stack.content_area(self.id).unwrap_or_default()
    }

    /// Draw directly into this panel's buffer without a full repaint and
    /// mark it dirty. Follow with `redraw(false)` to put it on screen.
    pub fn paint(&mut self, f: impl FnOnce(&S, Rect, &mut Buffer)) {
        let state: &S = self.cx.state;
        if let Some((area, buf)) = self.cx.stack.region_mut(self.id) {
            f(state, area, buf);
        }
    }
}
