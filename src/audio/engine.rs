//! Bounded pool of players plus the shared progress aggregate.
//!
//! The engine owns a small tokio runtime whose blocking pool is capped at
//! `workers` threads; each [`Player`] runs on it via `spawn_blocking`.
//! Activations beyond the cap queue until a thread frees up.
//!
//! Players report to the UI thread through an `mpsc` channel. Before sending,
//! a worker applies its sample to the shared [`ProgressCollection`], so a
//! `Progress` event always means "this sound's visible progress changed".

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use uuid::Uuid;

use crate::audio::device::AudioDevice;
use crate::audio::player::{Player, PlayerHandle, PlayerSettings};
use crate::core::model::{RepressMode, Sound};
use crate::core::progress::{ProgressCollection, ProgressSample};

/// Sent from workers to the UI thread.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    Progress(ProgressSample),
    Finished {
        player_id: Uuid,
        sound_id: i64,
        /// Progress reached before the player ended.
        progress: f64,
    },
}

/// What an activation did to the sound.
#[derive(Clone, Debug)]
pub enum Activation {
    Started(PlayerHandle),
    Stopped(usize),
    Restarted(PlayerHandle),
    Overdubbed(PlayerHandle),
}

#[derive(Clone, Copy, Debug)]
pub struct EngineOptions {
    pub workers: usize,
    pub player: PlayerSettings,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            workers: 10,
            player: PlayerSettings::default(),
        }
    }
}

#[derive(Default)]
struct Shared {
    active: Vec<PlayerHandle>,
    progress: ProgressCollection,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // A panicking player must not take playback down with it.
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Engine {
    runtime: Option<tokio::runtime::Runtime>,
    device: Arc<dyn AudioDevice>,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::Sender<PlayerEvent>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(
        device: Arc<dyn AudioDevice>,
        options: EngineOptions,
    ) -> io::Result<(Self, mpsc::Receiver<PlayerEvent>)> {
        let workers = options.workers.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("soundboard-player")
            .build()?;
        let (tx, rx) = mpsc::channel();
        info!(
            "Playback engine ready: device={}, workers={}, chunk={:?}",
            device.name(),
            workers,
            options.player.chunk
        );
        Ok((
            Self {
                runtime: Some(runtime),
                device,
                shared: Arc::new(Mutex::new(Shared::default())),
                events: tx,
                options,
            },
            rx,
        ))
    }

    /// Start one more player for `sound`.
    pub fn play(&self, sound: &Sound) -> PlayerHandle {
        let player = Player::new(sound.clone(), Arc::clone(&self.device), self.options.player);
        let handle = player.handle();
        lock(&self.shared).active.push(handle.clone());
        debug!("Starting player {} for '{}'", handle.id, sound.name);

        let Some(runtime) = &self.runtime else {
            warn!("Engine is shut down, not playing '{}'", sound.name);
            self.finish(&handle, 0.0);
            return handle;
        };

        let shared = Arc::clone(&self.shared);
        let tx = self.events.clone();
        let done = handle.clone();
        runtime.spawn_blocking(move || {
            let reached = player.run(|sample| {
                if lock(&shared).progress.append(sample) {
                    let _ = tx.send(PlayerEvent::Progress(sample));
                }
            });
            complete(&shared, &tx, &done, reached);
        });
        handle
    }

    fn finish(&self, handle: &PlayerHandle, reached: f64) {
        complete(&self.shared, &self.events, handle, reached);
    }

    /// Signal every player of `sound_id` to stop. Returns how many were signalled.
    pub fn stop_sound(&self, sound_id: i64) -> usize {
        let shared = lock(&self.shared);
        let mut count = 0;
        for handle in shared.active.iter().filter(|h| h.sound_id == sound_id) {
            if !handle.is_stopping() {
                handle.stop();
                count += 1;
            }
        }
        count
    }

    /// Signal every player to stop without waiting for them.
    pub fn stop_all(&self) {
        let shared = lock(&self.shared);
        for handle in &shared.active {
            handle.stop();
        }
        if !shared.active.is_empty() {
            info!("Stopping {} players", shared.active.len());
        }
    }

    /// Apply the repress policy to an activation of `sound`.
    pub fn activate(&self, sound: &Sound, mode: RepressMode) -> Activation {
        if !self.is_playing(sound.id) {
            return Activation::Started(self.play(sound));
        }
        match mode {
            RepressMode::Stop => Activation::Stopped(self.stop_sound(sound.id)),
            RepressMode::Restart => {
                self.stop_sound(sound.id);
                Activation::Restarted(self.play(sound))
            }
            RepressMode::Overdub => Activation::Overdubbed(self.play(sound)),
        }
    }

    /// True if a player of `sound_id` is running and not already stopping.
    pub fn is_playing(&self, sound_id: i64) -> bool {
        lock(&self.shared)
            .active
            .iter()
            .any(|h| h.sound_id == sound_id && !h.is_stopping())
    }

    pub fn active_count(&self) -> usize {
        lock(&self.shared).active.len()
    }

    pub fn players_of(&self, sound_id: i64) -> Vec<PlayerHandle> {
        lock(&self.shared)
            .active
            .iter()
            .filter(|h| h.sound_id == sound_id)
            .cloned()
            .collect()
    }

    pub fn progress_of(&self, sound_id: i64) -> Option<f64> {
        lock(&self.shared).progress.progress_of(sound_id)
    }

    pub fn total_progress(&self, now: Instant) -> Option<f64> {
        lock(&self.shared).progress.total(now)
    }

    /// Run `f` against the progress aggregate while holding the lock.
    pub fn with_progress<R>(&self, f: impl FnOnce(&ProgressCollection) -> R) -> R {
        f(&lock(&self.shared).progress)
    }

    /// Stop everything and give workers up to `grace` to wind down.
    pub fn shutdown(&mut self, grace: Duration) {
        self.stop_all();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(grace);
            info!("Playback engine shut down");
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            self.stop_all();
            runtime.shutdown_background();
        }
    }
}

/// Completion path, run on the worker: drop out of the active set, release
/// the progress entry if still owned, then tell the UI.
fn complete(
    shared: &Mutex<Shared>,
    tx: &mpsc::Sender<PlayerEvent>,
    handle: &PlayerHandle,
    reached: f64,
) {
    {
        let mut shared = lock(shared);
        shared.active.retain(|h| h.id != handle.id);
        shared.progress.remove_if_owner(handle.sound_id, handle.id);
    }
    let _ = tx.send(PlayerEvent::Finished {
        player_id: handle.id,
        sound_id: handle.sound_id,
        progress: reached,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::SilentDevice;
    use crate::test_support::{sound_at, temp_dir, write_wav};

    const WAIT: Duration = Duration::from_secs(5);

    fn engine(device: SilentDevice) -> (Engine, mpsc::Receiver<PlayerEvent>) {
        Engine::new(
            Arc::new(device),
            EngineOptions {
                workers: 4,
                player: PlayerSettings {
                    chunk: Duration::from_millis(10),
                    progress_steps: 100,
                },
            },
        )
        .unwrap()
    }

    fn wait_finished(rx: &mpsc::Receiver<PlayerEvent>, n: usize) -> Vec<(Uuid, f64)> {
        let mut done = Vec::new();
        while done.len() < n {
            match rx.recv_timeout(WAIT).unwrap() {
                PlayerEvent::Finished {
                    player_id,
                    progress,
                    ..
                } => done.push((player_id, progress)),
                PlayerEvent::Progress(_) => {}
            }
        }
        done
    }

    #[test]
    fn test_natural_completion_cleans_up() {
        let dir = temp_dir();
        let path = dir.join("short.wav");
        write_wav(&path, 1000, 1, &vec![0i16; 100]);
        let (engine, rx) = engine(SilentDevice::instant());

        let handle = engine.play(&sound_at(1, &path));
        let done = wait_finished(&rx, 1);
        assert_eq!(done[0].0, handle.id);
        assert!(done[0].1 >= 0.5);
        assert_eq!(engine.active_count(), 0);
        assert_eq!(engine.progress_of(1), None);
    }

    #[test]
    fn test_stop_mode_stops_running_sound() {
        let dir = temp_dir();
        let path = dir.join("long.wav");
        write_wav(&path, 1000, 1, &vec![0i16; 10_000]);
        let (engine, rx) = engine(SilentDevice::realtime());
        let sound = sound_at(2, &path);

        assert!(matches!(engine.activate(&sound, RepressMode::Stop), Activation::Started(_)));
        assert!(engine.is_playing(2));
        assert!(matches!(engine.activate(&sound, RepressMode::Stop), Activation::Stopped(1)));
        assert!(!engine.is_playing(2));

        let done = wait_finished(&rx, 1);
        assert!(done[0].1 < 0.5);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_restart_replaces_player() {
        let dir = temp_dir();
        let path = dir.join("long.wav");
        write_wav(&path, 1000, 1, &vec![0i16; 10_000]);
        let (engine, rx) = engine(SilentDevice::realtime());
        let sound = sound_at(3, &path);

        let Activation::Started(first) = engine.activate(&sound, RepressMode::Restart) else {
            panic!("expected a fresh start");
        };
        let Activation::Restarted(second) = engine.activate(&sound, RepressMode::Restart) else {
            panic!("expected a restart");
        };
        assert!(first.is_stopping());
        assert!(!second.is_stopping());

        let done = wait_finished(&rx, 1);
        assert_eq!(done[0].0, first.id);
        assert_eq!(engine.players_of(3).len(), 1);
        engine.stop_all();
        wait_finished(&rx, 1);
    }

    #[test]
    fn test_overdub_runs_two_players_and_shows_newest() {
        let dir = temp_dir();
        let path = dir.join("long.wav");
        write_wav(&path, 1000, 1, &vec![0i16; 10_000]);
        let (engine, rx) = engine(SilentDevice::realtime());
        let sound = sound_at(4, &path);

        let Activation::Started(first) = engine.activate(&sound, RepressMode::Overdub) else {
            panic!("expected a fresh start");
        };
        std::thread::sleep(Duration::from_millis(30));
        let Activation::Overdubbed(second) = engine.activate(&sound, RepressMode::Overdub) else {
            panic!("expected an overdub");
        };
        assert_ne!(first.id, second.id);
        assert_eq!(engine.players_of(4).len(), 2);

        // Wait until the newer player has reported at least once.
        let deadline = Instant::now() + WAIT;
        while engine.with_progress(|p| p.get(4).map(|s| s.player_id)) != Some(second.id) {
            assert!(Instant::now() < deadline, "newer player never became visible");
            std::thread::sleep(Duration::from_millis(5));
        }

        // Ending the newer one drops the sound from the aggregate although
        // the older player keeps running.
        second.stop();
        let done = wait_finished(&rx, 1);
        assert_eq!(done[0].0, second.id);
        assert!(engine.is_playing(4));
        assert!(
            engine.with_progress(|p| p.get(4).map(|s| s.player_id)) != Some(second.id)
        );

        engine.stop_all();
        wait_finished(&rx, 1);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_failed_player_finishes_with_zero_progress() {
        let (engine, rx) = engine(SilentDevice::instant());
        engine.play(&sound_at(5, std::path::Path::new("/nonexistent/x.wav")));
        let done = wait_finished(&rx, 1);
        assert_eq!(done[0].1, 0.0);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_shutdown_stops_players() {
        let dir = temp_dir();
        let path = dir.join("long.wav");
        write_wav(&path, 1000, 1, &vec![0i16; 10_000]);
        let (mut engine, _rx) = engine(SilentDevice::realtime());
        let handle = engine.play(&sound_at(6, &path));
        engine.shutdown(Duration::from_secs(1));
        assert!(handle.is_stopping());
    }
}
