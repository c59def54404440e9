//! # Compositor
//!
//! Each attached panel owns an off-screen [`Buffer`] covering its region
//! (a *layer*). Layers are stacked by `(z_index, insertion order)`: a higher
//! z draws above a lower one, and among equal z the later-attached panel
//! draws above.
//!
//! ```text
//!   z=2  ┌──────help──────┐           output buffer
//!   z=1  │  ┌─status─┐    │    blit    ┌──────────────┐   draw   terminal
//!   z=0  ├──┴────────┴────┤  ───────▶  │ composited   │ ───────▶ (diffed)
//!        │ top/list/bottom│  (z order) │ frame        │
//!        └────────────────┘            └──────────────┘
//! ```
//!
//! Operations never draw directly. They update the [`Stack`] and queue
//! damage; [`Screen::flush`] resolves the queue once per loop iteration:
//!
//! - `Redraw { force: true }`: repaint the layer (border, title, content),
//!   then re-blit it and every visible layer above it.
//! - `Redraw { force: false }`: re-blit only if the layer was painted since
//!   the last flush (see [`PanelCx::paint`]).
//! - `Restack`: visibility or z-order changed; re-blit every visible layer
//!   bottom to top.

use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use log::{debug, error, warn};
use ratatui::Terminal;
use ratatui::backend::Backend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Rect};
use ratatui::widgets::{Block, Widget};

use crate::tui::event::{EventSource, KeyPress, TuiEvent};
use crate::tui::geometry::{Size, validate};
use crate::tui::panel::{Model, Panel, PanelCx, PanelId, PanelOptions, Requests, ScreenCx};

/// How long the loop waits for input before polling for background changes.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Upper bound on change-broadcast rounds per iteration. A panel that emits
/// a change from `on_change` on every round would otherwise spin forever.
const MAX_CHANGE_ROUNDS: usize = 16;

/// Screen-level key handler, consulted before any panel.
pub type GlobalKeys<S> = fn(&KeyPress, &mut ScreenCx<'_, S>) -> bool;

#[derive(Debug)]
struct Layer {
    rect: Rect,
    buffer: Buffer,
    z_index: i32,
    seq: u64,
    visible: bool,
    popup: bool,
    border: bool,
    /// Painted since the last flush.
    dirty: bool,
}

impl Layer {
    fn content_area(&self) -> Rect {
        if self.border {
            Block::bordered().inner(self.rect)
        } else {
            self.rect
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Damage {
    Redraw { id: PanelId, force: bool },
    Restack,
}

/// Geometry, visibility and z-order of every attached panel.
#[derive(Debug)]
pub struct Stack {
    layers: BTreeMap<PanelId, Layer>,
    size: Size,
    next_id: u32,
    next_seq: u64,
    damage: Vec<Damage>,
}

impl Stack {
    pub fn new(size: Size) -> Self {
        Self {
            layers: BTreeMap::new(),
            size,
            next_id: 0,
            next_seq: 0,
            damage: Vec::new(),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub(crate) fn allocate_id(&mut self) -> PanelId {
        let id = PanelId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert(&mut self, id: PanelId, rect: Rect, options: PanelOptions) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.layers.insert(
            id,
            Layer {
                rect,
                buffer: Buffer::empty(rect),
                z_index: options.z_index,
                seq,
                visible: !options.hidden,
                popup: options.popup,
                border: options.border,
                dirty: false,
            },
        );
        if !options.hidden {
            self.damage.push(Damage::Redraw { id, force: true });
        }
    }

    fn remove(&mut self, id: PanelId) -> bool {
        match self.layers.remove(&id) {
            Some(layer) => {
                if layer.visible {
                    self.damage.push(Damage::Restack);
                }
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(&self, id: PanelId) -> bool {
        self.layers.contains_key(&id)
    }

    /// Every attached panel, bottom to top.
    pub fn order(&self) -> Vec<PanelId> {
        let mut ids: Vec<(i32, u64, PanelId)> = self
            .layers
            .iter()
            .map(|(id, layer)| (layer.z_index, layer.seq, *id))
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, _, id)| id).collect()
    }

    /// Visible panels, bottom to top.
    pub fn visible_order(&self) -> Vec<PanelId> {
        self.order()
            .into_iter()
            .filter(|id| self.is_visible(*id))
            .collect()
    }

    pub fn is_visible(&self, id: PanelId) -> bool {
        self.layers.get(&id).is_some_and(|layer| layer.visible)
    }

    pub fn z_index(&self, id: PanelId) -> Option<i32> {
        self.layers.get(&id).map(|layer| layer.z_index)
    }

    pub fn rect(&self, id: PanelId) -> Option<Rect> {
        self.layers.get(&id).map(|layer| layer.rect)
    }

    pub fn content_area(&self, id: PanelId) -> Option<Rect> {
        self.layers.get(&id).map(Layer::content_area)
    }

    pub fn popup_open(&self) -> bool {
        self.layers.values().any(|layer| layer.visible && layer.popup)
    }

    pub fn show(&mut self, id: PanelId) {
        if let Some(layer) = self.layers.get_mut(&id) {
            layer.visible = true;
            self.damage.push(Damage::Redraw { id, force: true });
        }
    }

    pub fn hide(&mut self, id: PanelId) {
        if let Some(layer) = self.layers.get_mut(&id)
            && layer.visible
        {
            layer.visible = false;
            self.damage.push(Damage::Restack);
        }
    }

    pub fn redraw(&mut self, id: PanelId, force: bool) {
        if self.layers.contains_key(&id) {
            self.damage.push(Damage::Redraw { id, force });
        }
    }

    /// Redraw every visible panel from scratch.
    pub fn redraw_all(&mut self) {
        for id in self.visible_order() {
            self.damage.push(Damage::Redraw { id, force: true });
        }
        self.damage.push(Damage::Restack);
    }

    pub fn set_z_index(&mut self, id: PanelId, z_index: i32) {
        if let Some(layer) = self.layers.get_mut(&id)
            && layer.z_index != z_index
        {
            layer.z_index = z_index;
            if layer.visible {
                self.damage.push(Damage::Restack);
            }
        }
    }

    /// Raise above every other panel.
    pub fn move_to_top(&mut self, id: PanelId) {
        let top = self
            .layers
            .iter()
            .filter(|(other, _)| **other != id)
            .map(|(_, layer)| layer.z_index)
            .max()
            .unwrap_or(-1);
        self.set_z_index(id, top + 1);
    }

    /// Lower beneath every other panel.
    pub fn move_to_bottom(&mut self, id: PanelId) {
        let bottom = self
            .layers
            .iter()
            .filter(|(other, _)| **other != id)
            .map(|(_, layer)| layer.z_index)
            .min()
            .unwrap_or(1);
        self.set_z_index(id, bottom - 1);
    }

    /// The panel's buffer and content area, marked dirty.
    pub(crate) fn region_mut(&mut self, id: PanelId) -> Option<(Rect, &mut Buffer)> {
        let layer = self.layers.get_mut(&id)?;
        layer.dirty = true;
        let area = layer.content_area();
        Some((area, &mut layer.buffer))
    }

    fn has_damage(&self) -> bool {
        !self.damage.is_empty()
    }
}

/// Copy the overlapping part of `layer` into `out`.
fn blit(layer: &Buffer, out: &mut Buffer) {
    let area = layer.area.intersection(out.area);
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            out[(x, y)] = layer[(x, y)].clone();
        }
    }
}

pub struct Screen<B: Backend, S: Model> {
    terminal: Terminal<B>,
    state: S,
    stack: Stack,
    panels: Vec<(PanelId, Box<dyn Panel<S>>)>,
    output: Buffer,
    global: Option<GlobalKeys<S>>,
    requests: Requests<S>,
    changes: Vec<S::Change>,
    tick: Duration,
}

fn backend_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::other(e.to_string())
}

impl<B: Backend, S: Model> Screen<B, S> {
    pub fn new(terminal: Terminal<B>, state: S) -> io::Result<Self> {
        let size = terminal.size().map_err(backend_error)?;
        Ok(Self {
            terminal,
            state,
            stack: Stack::new(size),
            panels: Vec::new(),
            output: Buffer::empty(Rect::new(0, 0, size.width, size.height)),
            global: None,
            requests: Requests::default(),
            changes: Vec::new(),
            tick: DEFAULT_TICK,
        })
    }

    pub fn with_global_keys(mut self, handler: GlobalKeys<S>) -> Self {
        self.global = Some(handler);
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<B> {
        &mut self.terminal
    }

    pub fn should_quit(&self) -> bool {
        self.requests.quit
    }

    /// Add a panel. It is drawn at the next flush unless attached hidden.
    pub fn attach(&mut self, panel: Box<dyn Panel<S>>) -> PanelId {
        let id = self.stack.allocate_id();
        self.attach_with_id(id, panel);
        id
    }

    fn attach_with_id(&mut self, id: PanelId, panel: Box<dyn Panel<S>>) {
        let size = self.stack.size();
        let rect = match validate(panel.placement(size), size) {
            Ok(rect) => rect,
            Err(e) => {
                error!("Panel '{}' cannot be placed: {e}", panel.name());
                Rect::default()
            }
        };
        debug!("Attaching panel '{}' as {id:?} at {rect:?}", panel.name());
        self.stack.insert(id, rect, panel.options());
        self.panels.push((id, panel));
    }

    /// Remove a panel; whatever it covered is recomposited.
    pub fn detach(&mut self, id: PanelId) -> bool {
        self.panels.retain(|(pid, _)| *pid != id);
        self.stack.remove(id)
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

    pub fn move_to_top(&mut self, id: PanelId) {
        self.stack.move_to_top(id);
    }

    pub fn move_to_bottom(&mut self, id: PanelId) {
        self.stack.move_to_bottom(id);
    }

    /// Re-apply the z-order. With `refresh`, composite and present now.
    pub fn reorder_panels(&mut self, refresh: bool) -> io::Result<()> {
        self.stack.damage.push(Damage::Restack);
        if refresh { self.flush() } else { Ok(()) }
    }

    /// Re-place every panel for a new terminal size and repaint everything.
    pub fn on_resize(&mut self, size: Size) {
        debug!("Resize to {}x{}", size.width, size.height);
        self.stack.size = size;
        self.output = Buffer::empty(Rect::new(0, 0, size.width, size.height));
        for (id, panel) in &self.panels {
            let Some(layer) = self.stack.layers.get_mut(id) else {
                continue;
            };
            match validate(panel.placement(size), size) {
                Ok(rect) => {
                    layer.rect = rect;
                    layer.buffer = Buffer::empty(rect);
                }
                Err(e) => warn!(
                    "Panel '{}' keeps its previous region after resize: {e}",
                    panel.name()
                ),
            }
        }
        self.stack.redraw_all();
    }

    /// Route one input event.
    pub fn handle_event(&mut self, event: TuiEvent) {
        match event {
            TuiEvent::Key(key) => self.dispatch_key(key),
            TuiEvent::Resize(width, height) => self.on_resize(Size::new(width, height)),
        }
        self.apply_requests();
    }

    /// The screen-level handler sees the key first, then panels from the
    /// top of the stack down until one consumes it. Hidden panels are
    /// offered input too; they decide for themselves whether to act.
    fn dispatch_key(&mut self, key: KeyPress) {
        if let Some(global) = self.global {
            let mut cx = ScreenCx {
                state: &mut self.state,
                stack: &mut self.stack,
                changes: &mut self.changes,
                requests: &mut self.requests,
            };
            if global(&key, &mut cx) {
                return;
            }
        }
        for id in self.stack.order().into_iter().rev() {
            let Some((_, panel)) = self.panels.iter_mut().find(|(pid, _)| *pid == id) else {
                continue;
            };
            let mut cx = PanelCx {
                id,
                cx: ScreenCx {
                    state: &mut self.state,
                    stack: &mut self.stack,
                    changes: &mut self.changes,
                    requests: &mut self.requests,
                },
            };
            if panel.take(&key, &mut cx) {
                return;
            }
        }
    }

    fn apply_requests(&mut self) {
        for (id, panel) in std::mem::take(&mut self.requests.spawned) {
            self.attach_with_id(id, panel);
        }
        for id in std::mem::take(&mut self.requests.detached) {
            self.detach(id);
        }
    }

    /// Collect background changes and broadcast every pending change to
    /// all panels, bottom to top.
    pub fn pump(&mut self) {
        self.state.poll_changes(&mut self.changes);
        let mut rounds = 0;
        while !self.changes.is_empty() {
            rounds += 1;
            if rounds > MAX_CHANGE_ROUNDS {
                warn!(
                    "Dropping {} changes after {MAX_CHANGE_ROUNDS} broadcast rounds",
                    self.changes.len()
                );
                self.changes.clear();
                break;
            }
            let batch = std::mem::take(&mut self.changes);
            for change in &batch {
                for id in self.stack.order() {
                    let Some((_, panel)) = self.panels.iter_mut().find(|(pid, _)| *pid == id)
                    else {
                        continue;
                    };
                    let mut cx = PanelCx {
                        id,
                        cx: ScreenCx {
                            state: &mut self.state,
                            stack: &mut self.stack,
                            changes: &mut self.changes,
                            requests: &mut self.requests,
                        },
                    };
                    panel.on_change(change, &mut cx);
                }
            }
            self.apply_requests();
        }
    }

    /// Full repaint of every panel followed by a present.
    pub fn repaint(&mut self) -> io::Result<()> {
        self.stack.redraw_all();
        self.flush()
    }

    /// Resolve queued damage and put the result on the terminal.
    pub fn flush(&mut self) -> io::Result<()> {
        if !self.stack.has_damage() {
            return Ok(());
        }
        let mut restack = false;
        let mut targets: Vec<(PanelId, bool)> = Vec::new();
        for damage in std::mem::take(&mut self.stack.damage) {
            match damage {
                Damage::Restack => restack = true,
                Damage::Redraw { id, force } => {
                    match targets.iter_mut().find(|(tid, _)| *tid == id) {
                        Some((_, f)) => *f |= force,
                        None => targets.push((id, force)),
                    }
                }
            }
        }

        for (id, force) in &targets {
            if *force && self.stack.is_visible(*id) {
                self.render_panel(*id);
            }
        }

        let mut composited = false;
        if restack {
            self.composite_all();
            composited = true;
        } else {
            let order = self.stack.visible_order();
            // Re-blitting from the lowest damaged layer covers the others.
            let lowest = order.iter().position(|id| {
                targets.iter().any(|(tid, force)| {
                    tid == id
                        && (*force || self.stack.layers.get(id).is_some_and(|l| l.dirty))
                })
            });
            if let Some(start) = lowest {
                for id in &order[start..] {
                    if let Some(layer) = self.stack.layers.get(id) {
                        blit(&layer.buffer, &mut self.output);
                    }
                }
                composited = true;
            }
        }

        for layer in self.stack.layers.values_mut() {
            layer.dirty = false;
        }
        if composited {
            self.present()?;
        }
        Ok(())
    }

    fn render_panel(&mut self, id: PanelId) {
        let Some(layer) = self.stack.layers.get_mut(&id) else {
            return;
        };
        let Some((_, panel)) = self.panels.iter_mut().find(|(pid, _)| *pid == id) else {
            return;
        };
        layer.buffer.reset();
        let rect = layer.rect;
        if rect.is_empty() {
            return;
        }
        let area = if layer.border {
            let mut block = Block::bordered();
            if let Some(title) = panel.title(&self.state) {
                block = block
                    .title(format!(" {title} "))
                    .title_alignment(Alignment::Center);
            }
            let inner = block.inner(rect);
            block.render(rect, &mut layer.buffer);
            inner
        } else {
            rect
        };
        panel.render(&self.state, area, &mut layer.buffer);
        layer.dirty = true;
    }

    fn composite_all(&mut self) {
        self.output.reset();
        for id in self.stack.visible_order() {
            if let Some(layer) = self.stack.layers.get(&id) {
                blit(&layer.buffer, &mut self.output);
            }
        }
    }

    fn present(&mut self) -> io::Result<()> {
        let output = &self.output;
        self.terminal
            .draw(|frame| {
                let target = frame.buffer_mut();
                blit(output, target);
            })
            .map_err(backend_error)?;
        Ok(())
    }

    /// Run until a quit is requested. The model is shut down on the way
    /// out, whether the loop ended normally or with an error.
    pub fn run(&mut self, events: &mut dyn EventSource) -> io::Result<()> {
        let result = self.event_loop(events);
        self.state.shutdown();
        result
    }

    fn event_loop(&mut self, events: &mut dyn EventSource) -> io::Result<()> {
        self.pump();
        self.repaint()?;
        while !self.requests.quit {
            if let Some(event) = events.next_event(self.tick)? {
                self.handle_event(event);
            }
            self.pump();
            self.flush()?;
        }
        Ok(())
    }

    /// Current text of terminal row `y`, for tests and diagnostics.
    pub fn row_text(&self, y: u16) -> String {
        let area = self.output.area;
        if y >= area.height {
            return String::new();
        }
        (area.left()..area.right())
            .map(|x| self.output[(x, y)].symbol())
            .collect()
    }
}
