//! Application state the compositor drives.
//!
//! `App` owns the library, the current display groups, the filter query and
//! the playback engine. Panels read it while drawing and call its methods
//! from key handlers; every mutation is announced as a [`Change`] so the
//! panels that care can repaint.
//!
//! Two inbound channels are drained in [`Model::poll_changes`]: player events
//! from the engine's workers and table notifications from the library. Both
//! are only ever touched from the UI thread.

use std::collections::BTreeSet;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::audio::engine::{Activation, Engine, PlayerEvent};
use crate::core::library::{Library, LibraryError, Table};
use crate::core::model::{Category, CategoryWithSounds, RepressMode, Sound};
use crate::tui::panel::Model;

/// Fraction of a sound that must have played for it to count as played.
pub const PLAYED_THRESHOLD: f64 = 0.5;

/// How long shutdown waits for players to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    /// `groups()` was reloaded from the library.
    Groups,
    Query,
    RepressMode,
    /// The selected sound changed.
    Selection,
    /// A sound's visible progress changed.
    Progress { sound_id: i64 },
    /// A player of this sound ended.
    Finished { sound_id: i64 },
    /// Sounds were marked or unmarked for a batch edit.
    Marks,
    /// Something failed and the user should hear about it.
    Status(String),
}

pub struct App {
    library: Box<dyn Library>,
    groups: Vec<CategoryWithSounds>,
    query: String,
    repress_mode: RepressMode,
    selected: Option<i64>,
    marked: BTreeSet<i64>,
    engine: Engine,
    player_events: mpsc::Receiver<PlayerEvent>,
    library_events: mpsc::Receiver<Table>,
    pending: Vec<Change>,
}

impl App {
    pub fn new(
        mut library: Box<dyn Library>,
        engine: Engine,
        player_events: mpsc::Receiver<PlayerEvent>,
    ) -> Result<Self, LibraryError> {
        let (tx, library_events) = mpsc::channel();
        library.on_change(Box::new(move |table| {
            let _ = tx.send(table);
        }));
        let groups = library.list_grouped("")?;
        let repress_mode = library.repress_mode();
        info!(
            "Loaded {} categories, repress mode {}",
            groups.len(),
            repress_mode.label()
        );
        Ok(Self {
            library,
            groups,
            query: String::new(),
            repress_mode,
            selected: None,
            marked: BTreeSet::new(),
            engine,
            player_events,
            library_events,
            pending: Vec::new(),
        })
    }

    pub fn groups(&self) -> &[CategoryWithSounds] {
        &self.groups
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn repress_mode(&self) -> RepressMode {
        self.repress_mode
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn library(&self) -> &dyn Library {
        self.library.as_ref()
    }

    pub fn sound(&self, sound_id: i64) -> Option<&Sound> {
        self.groups
            .iter()
            .flat_map(|g| g.sounds.iter())
            .find(|s| s.id == sound_id)
    }

    pub fn category(&self, category_id: i64) -> Option<&Category> {
        self.groups
            .iter()
            .filter_map(|g| g.category.as_ref())
            .find(|c| c.id == category_id)
    }

    pub fn selected_sound(&self) -> Option<&Sound> {
        self.selected.and_then(|id| self.sound(id))
    }

    /// Record which sound the list has selected (`None` for a category row).
    pub fn select(&mut self, sound_id: Option<i64>) {
        if self.selected != sound_id {
            self.selected = sound_id;
            self.pending.push(Change::Selection);
        }
    }

    // ========================================================================
    // Marks
    // ========================================================================

    pub fn marked(&self) -> &BTreeSet<i64> {
        &self.marked
    }

    pub fn is_marked(&self, sound_id: i64) -> bool {
        self.marked.contains(&sound_id)
    }

    /// Flip the mark on `sound_id`. Returns whether it is now marked.
    pub fn toggle_mark(&mut self, sound_id: i64) -> bool {
        let marked = if self.marked.remove(&sound_id) {
            false
        } else {
            self.marked.insert(sound_id)
        };
        self.pending.push(Change::Marks);
        marked
    }

    pub fn clear_marks(&mut self) -> bool {
        if self.marked.is_empty() {
            return false;
        }
        self.marked.clear();
        self.pending.push(Change::Marks);
        true
    }

    /// Move every marked sound into `category_id` and clear the marks.
    /// On failure nothing moves and the marks stay.
    pub fn move_marked(&mut self, category_id: i64) -> Result<usize, LibraryError> {
        let ids: Vec<i64> = self.marked.iter().copied().collect();
        let moved = self.library.move_sounds(&ids, category_id)?;
        self.clear_marks();
        Ok(moved)
    }

    /// Marks on sounds the library no longer has are dropped. Sounds hidden
    /// by the filter keep theirs.
    fn prune_marks(&mut self) {
        let before = self.marked.len();
        let library = &self.library;
        self.marked.retain(|&id| library.get_sound(id).is_ok());
        if self.marked.len() != before {
            debug!("Dropped {} stale marks", before - self.marked.len());
            self.pending.push(Change::Marks);
        }
    }

    // ========================================================================
    // Filter query
    // ========================================================================

    /// Append to the filter. A leading space is refused.
    pub fn push_query_char(&mut self, c: char) -> bool {
        if self.query.is_empty() && c == ' ' {
            return false;
        }
        self.query.push(c);
        self.query_changed();
        true
    }

    pub fn pop_query_char(&mut self) -> bool {
        if self.query.pop().is_none() {
            return false;
        }
        self.query_changed();
        true
    }

    pub fn clear_query(&mut self) -> bool {
        if self.query.is_empty() {
            return false;
        }
        self.query.clear();
        self.query_changed();
        true
    }

    fn query_changed(&mut self) {
        debug!("Filter query is now {:?}", self.query);
        self.pending.push(Change::Query);
        self.reload();
    }

    /// Re-read the display groups for the current query.
    pub fn reload(&mut self) {
        match self.library.list_grouped(&self.query) {
            Ok(groups) => {
                self.groups = groups;
                self.pending.push(Change::Groups);
                self.prune_marks();
            }
            Err(e) => self.report("Could not load sounds", &e),
        }
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Trigger `sound_id` under the current repress mode.
    pub fn activate(&mut self, sound_id: i64) -> Option<Activation> {
        let sound = self.sound(sound_id)?.clone();
        let activation = self.engine.activate(&sound, self.repress_mode);
        debug!("Activated '{}': {activation:?}", sound.name);
        Some(activation)
    }

    pub fn stop_all(&mut self) {
        self.engine.stop_all();
    }

    /// Persist the next repress mode. The new mode is picked up from the
    /// library's change notification.
    pub fn cycle_repress_mode(&mut self) -> Result<RepressMode, LibraryError> {
        let next = self.repress_mode.next();
        self.library.set_repress_mode(next)?;
        Ok(next)
    }

    pub fn toggle_category(&mut self, category_id: i64) -> Result<bool, LibraryError> {
        let mut category = self.library.get_category(category_id)?;
        category.is_expanded = !category.is_expanded;
        self.library.update_category(&category)?;
        Ok(category.is_expanded)
    }

    pub fn progress_of(&self, sound_id: i64) -> Option<f64> {
        self.engine.progress_of(sound_id)
    }

    pub fn total_progress(&self) -> Option<f64> {
        self.engine.total_progress(Instant::now())
    }

    /// Queue a status message for the user and log it.
    pub fn report(&mut self, context: &str, e: &dyn std::fmt::Display) {
        error!("{context}: {e}");
        self.pending.push(Change::Status(format!("{context}: {e}")));
    }

    fn on_player_event(&mut self, event: PlayerEvent, changes: &mut Vec<Change>) {
        let change = match event {
            PlayerEvent::Progress(sample) => Change::Progress {
                sound_id: sample.sound_id,
            },
            PlayerEvent::Finished {
                sound_id, progress, ..
            } => {
                if progress >= PLAYED_THRESHOLD {
                    match self.library.increment_play_count(sound_id) {
                        Ok(count) => debug!("Sound {sound_id} played {count} times"),
                        Err(e) => self.report("Could not update play count", &e),
                    }
                }
                Change::Finished { sound_id }
            }
        };
        if !changes.contains(&change) {
            changes.push(change);
        }
    }

    fn on_table_changed(&mut self, tables: &[Table]) {
        if tables.contains(&Table::Meta) {
            let mode = self.library.repress_mode();
            if mode != self.repress_mode {
                info!("Repress mode set to {}", mode.label());
                self.repress_mode = mode;
                self.pending.push(Change::RepressMode);
            }
        }
        if tables
            .iter()
            .any(|t| matches!(t, Table::Sounds | Table::Categories))
        {
            self.reload();
        }
    }
}

impl Model for App {
    type Change = Change;

    fn poll_changes(&mut self, changes: &mut Vec<Change>) {
        while let Ok(event) = self.player_events.try_recv() {
            self.on_player_event(event, changes);
        }
        let mut tables: Vec<Table> = Vec::new();
        while let Ok(table) = self.library_events.try_recv() {
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
        if !tables.is_empty() {
            self.on_table_changed(&tables);
        }
        changes.append(&mut self.pending);
    }

    fn shutdown(&mut self) {
        self.engine.shutdown(SHUTDOWN_GRACE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::SilentDevice;
    use crate::audio::engine::EngineOptions;
    use crate::audio::player::PlayerSettings;
    use crate::core::library::JsonLibrary;
    use crate::core::model::NewSound;
    use crate::test_support::{sample_library, temp_dir, write_wav};
    use std::sync::Arc;

    fn app_with(library: JsonLibrary) -> App {
        let (engine, rx) = Engine::new(
            Arc::new(SilentDevice::instant()),
            EngineOptions {
                workers: 2,
                player: PlayerSettings {
                    chunk: Duration::from_millis(10),
                    progress_steps: 10,
                },
            },
        )
        .unwrap();
        App::new(Box::new(library), engine, rx).unwrap()
    }

    fn drain(app: &mut App) -> Vec<Change> {
        let mut changes = Vec::new();
        app.poll_changes(&mut changes);
        changes
    }

    /// Poll until `pred` holds for a batch of changes, or give up after 5s.
    fn wait_for(app: &mut App, pred: impl Fn(&App, &[Change]) -> bool) -> Vec<Change> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            seen.extend(drain(app));
            if pred(app, &seen) {
                return seen;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("timed out; saw {seen:?}");
    }

    #[test]
    fn test_loads_groups() {
        let app = app_with(sample_library());
        assert_eq!(app.groups().len(), 2);
        assert_eq!(app.groups()[0].sounds.len(), 3);
        assert_eq!(app.repress_mode(), RepressMode::default());
    }

    #[test]
    fn test_query_filters_and_refuses_leading_space() {
        let mut app = app_with(sample_library());
        assert!(!app.push_query_char(' '));
        assert!(app.push_query_char('b'));
        assert!(app.push_query_char('o'));
        let changes = drain(&mut app);
        assert!(changes.contains(&Change::Query));
        assert!(changes.contains(&Change::Groups));
        assert_eq!(app.groups().len(), 1);
        assert!(app.groups()[0].category.is_none());
        let names: Vec<_> = app.groups()[0].sounds.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Boing", "Sad trombone"]);

        assert!(app.clear_query());
        assert!(!app.clear_query());
        assert_eq!(app.groups().len(), 2);
    }

    #[test]
    fn test_cycle_repress_mode_arrives_as_change() {
        let mut app = app_with(sample_library());
        let before = app.repress_mode();
        let next = app.cycle_repress_mode().unwrap();
        assert_eq!(next, before.next());
        let changes = drain(&mut app);
        assert_eq!(changes, vec![Change::RepressMode]);
        assert_eq!(app.repress_mode(), next);
    }

    #[test]
    fn test_toggle_category_reloads() {
        let mut app = app_with(sample_library());
        let id = app.groups()[0].category.as_ref().unwrap().id;
        assert!(!app.toggle_category(id).unwrap());
        let changes = drain(&mut app);
        assert!(changes.contains(&Change::Groups));
        assert!(!app.category(id).unwrap().is_expanded);
    }

    #[test]
    fn test_toggle_missing_category_is_an_error() {
        let mut app = app_with(sample_library());
        assert!(app.toggle_category(999).is_err());
    }

    #[test]
    fn test_select_only_announces_changes() {
        let mut app = app_with(sample_library());
        let id = app.groups()[0].sounds[0].id;
        app.select(Some(id));
        app.select(Some(id));
        assert_eq!(drain(&mut app), vec![Change::Selection]);
        assert_eq!(app.selected_sound().unwrap().name, "Airhorn");
    }

    #[test]
    fn test_full_playback_counts_a_play() {
        let dir = temp_dir();
        let path = dir.join("ding.wav");
        write_wav(&path, 1000, 1, &vec![0i16; 100]);
        let mut library = JsonLibrary::in_memory();
        let sound = library
            .create_sound(NewSound {
                name: "ding".into(),
                path,
                category_id: None,
                duration_ms: Some(100),
            })
            .unwrap();
        let mut app = app_with(library);

        assert!(matches!(app.activate(sound.id), Some(Activation::Started(_))));
        wait_for(&mut app, |app, seen| {
            seen.contains(&Change::Finished { sound_id: sound.id })
                && app.library().get_sound(sound.id).unwrap().play_count == 1
        });
        assert_eq!(app.progress_of(sound.id), None);
        assert_eq!(app.sound(sound.id).unwrap().play_count, 1);
    }

    #[test]
    fn test_failed_playback_does_not_count() {
        let mut app = app_with(sample_library());
        let id = app.groups()[0].sounds[0].id;
        app.activate(id);
        wait_for(&mut app, |_, seen| seen.contains(&Change::Finished { sound_id: id }));
        assert_eq!(app.sound(id).unwrap().play_count, 0);
        assert!(!app.engine().is_playing(id));
    }

    #[test]
    fn test_marks_toggle_and_clear() {
        let mut app = app_with(sample_library());
        let airhorn = app.groups()[0].sounds[0].id;
        let boing = app.groups()[0].sounds[1].id;
        assert!(app.toggle_mark(airhorn));
        assert!(app.toggle_mark(boing));
        assert!(!app.toggle_mark(airhorn));
        assert_eq!(app.marked().iter().copied().collect::<Vec<_>>(), vec![boing]);
        assert!(app.is_marked(boing));
        assert_eq!(drain(&mut app), vec![Change::Marks; 3]);

        assert!(app.clear_marks());
        assert!(!app.clear_marks());
        assert!(app.marked().is_empty());
    }

    #[test]
    fn test_move_marked_moves_all_and_clears() {
        let mut app = app_with(sample_library());
        let target = app.groups()[1].category.as_ref().unwrap().id;
        let ids: Vec<i64> = app.groups()[0].sounds.iter().take(2).map(|s| s.id).collect();
        for &id in &ids {
            app.toggle_mark(id);
        }
        assert_eq!(app.move_marked(target).unwrap(), 2);
        assert!(app.marked().is_empty());
        wait_for(&mut app, |app, seen| {
            seen.contains(&Change::Groups) && app.groups()[1].sounds.len() == 4
        });
        for id in ids {
            assert_eq!(app.sound(id).unwrap().category_id, target);
        }
    }

    #[test]
    fn test_failed_move_keeps_marks() {
        let mut app = app_with(sample_library());
        let id = app.groups()[0].sounds[0].id;
        app.toggle_mark(id);
        assert!(app.move_marked(999).is_err());
        assert!(app.is_marked(id));
    }

    #[test]
    fn test_marks_on_deleted_sounds_are_dropped() {
        let library = sample_library();
        let id = library.list_sounds().unwrap()[0].id;
        let mut app = app_with(library);
        app.toggle_mark(id);
        drain(&mut app);
        app.library.delete_sound(id).unwrap();
        let changes = drain(&mut app);
        assert!(changes.contains(&Change::Marks));
        assert!(app.marked().is_empty());
    }

    #[test]
    fn test_activate_unknown_sound() {
        let mut app = app_with(sample_library());
        assert!(app.activate(12345).is_none());
    }
}
