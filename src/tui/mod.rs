//! # TUI Adapter
//!
//! The ratatui/crossterm layer: a panel compositor ([`screen`]), the panel
//! contract ([`panel`]) and the soundboard's panels ([`panels`]).
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Loop
//!
//! One thread owns the terminal. Each iteration it waits up to a tick for a
//! key, routes it, drains player and library events from the model, lets the
//! panels react, and flushes whatever damage that produced. Nothing is drawn
//! from any other thread.

pub mod event;
pub mod geometry;
pub mod panel;
pub mod panels;
pub mod screen;

use std::io::{self, stdout};
use std::time::Duration;

use crossterm::cursor::{Hide, Show};
use crossterm::event::{
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use log::info;

use crate::audio::engine::{Engine, EngineOptions};
use crate::audio::output_device;
use crate::audio::player::PlayerSettings;
use crate::core::config::ResolvedConfig;
use crate::core::library::Library;
use crate::core::state::App;
use crate::tui::event::CrosstermEvents;
use crate::tui::screen::Screen;

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> io::Result<Self> {
        // Kitty keyboard protocol makes Alt+<key> and Esc unambiguous;
        // terminals without it ignore the sequence.
        execute!(
            stdout(),
            Hide,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )?;
        info!("Terminal modes enabled (hidden cursor, keyboard enhancement)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), PopKeyboardEnhancementFlags, Show);
    }
}

/// Build the playback engine and app state, then run the UI until quit.
pub fn run(config: &ResolvedConfig, library: Box<dyn Library>) -> io::Result<()> {
    let device = output_device(config.device).map_err(io::Error::other)?;
    let (engine, player_events) = Engine::new(
        device,
        EngineOptions {
            workers: config.workers,
            player: PlayerSettings {
                chunk: Duration::from_millis(config.chunk_ms),
                progress_steps: config.progress_steps,
            },
        },
    )?;
    let app = App::new(library, engine, player_events).map_err(io::Error::other)?;

    let terminal = ratatui::init();
    let guard = TerminalModeGuard::new();
    let result = Screen::new(terminal, app).and_then(|screen| {
        let mut screen = screen.with_global_keys(panels::global_keys);
        panels::attach_all(&mut screen);
        screen.run(&mut CrosstermEvents)
    });
    drop(guard);
    ratatui::restore();
    info!("Soundboard exiting");
    result
}
