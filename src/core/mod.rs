//! # Core Application Logic
//!
//! The soundboard's domain: the library model and store, the virtualized
//! list, progress aggregation and the application state. Nothing in here
//! draws; only [`state`] touches the playback engine.
//!
//! ```text
//!   library (store) ──on_change──▶ state::App ──groups──▶ sound_list
//!                                     ▲
//!   audio::engine ──PlayerEvent──────┘   progress (shared with workers)
//! ```
//!
//! ## Modules
//!
//! - [`model`]: Sound, Category, RepressMode
//! - [`library`]: the `Library` persistence trait and its JSON implementation
//! - [`sound_list`]: flattened, scrolling, single-selection list
//! - [`progress`]: per-sound latest progress sample and the global aggregate
//! - [`state`]: the `App` model driven by the compositor
//! - [`config`]: config file, env and CLI resolution
//! - [`format`]: duration formatting

pub mod config;
pub mod format;
pub mod library;
pub mod model;
pub mod progress;
pub mod sound_list;
pub mod state;
