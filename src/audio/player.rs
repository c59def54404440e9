//! One in-flight playback of one sound.
//!
//! [`Player::run`] blocks its worker thread for the whole playback: it reads
//! a chunk from the file, writes it to the device (which blocks while the
//! device buffer is full), samples the stream clock and reports progress.
//! Stop is cooperative and checked between chunks, so a stop takes effect
//! within one chunk duration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error};
use uuid::Uuid;

use crate::audio::device::{AudioDevice, OutputStream, StreamSpec};
use crate::audio::wav::WavReader;
use crate::audio::PlaybackError;
use crate::core::model::Sound;
use crate::core::progress::ProgressSample;

/// Shared view of a running player; cloning is cheap.
#[derive(Clone, Debug)]
pub struct PlayerHandle {
    pub id: Uuid,
    pub sound_id: i64,
    pub created_at: Instant,
    stop: Arc<AtomicBool>,
}

impl PlayerHandle {
    /// Ask the player to stop after its current chunk.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PlayerSettings {
    /// Audio per device write.
    pub chunk: Duration,
    /// Progress is rounded to `1 / progress_steps` before emitting.
    pub progress_steps: u32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            chunk: Duration::from_millis(100),
            progress_steps: 100,
        }
    }
}

pub struct Player {
    handle: PlayerHandle,
    sound: Sound,
    device: Arc<dyn AudioDevice>,
    settings: PlayerSettings,
}

/// Emits samples, skipping those whose rounded progress did not change.
struct Reporter<'a, F> {
    handle: &'a PlayerHandle,
    steps: f64,
    duration: Duration,
    last: Option<f64>,
    reached: f64,
    emit: F,
}

impl<F: FnMut(ProgressSample)> Reporter<'_, F> {
    fn report(&mut self, progress: f64) {
        let progress = progress.clamp(0.0, 1.0);
        let rounded = (progress * self.steps).round() / self.steps;
        self.reached = self.reached.max(progress);
        if self.last == Some(rounded) {
            return;
        }
        self.last = Some(rounded);
        self.send(rounded);
    }

    fn send(&mut self, progress: f64) {
        (self.emit)(ProgressSample {
            player_id: self.handle.id,
            sound_id: self.handle.sound_id,
            created_at: self.handle.created_at,
            sampled_at: Instant::now(),
            progress,
            duration: self.duration,
        });
    }
}

impl Player {
    pub fn new(sound: Sound, device: Arc<dyn AudioDevice>, settings: PlayerSettings) -> Self {
        let handle = PlayerHandle {
            id: Uuid::new_v4(),
            sound_id: sound.id,
            created_at: Instant::now(),
            stop: Arc::new(AtomicBool::new(false)),
        };
        Self {
            handle,
            sound,
            device,
            settings,
        }
    }

    pub fn handle(&self) -> PlayerHandle {
        self.handle.clone()
    }

    /// Play to completion or until stopped, then emit a final sample at 1.0.
    ///
    /// Errors opening, decoding or writing are logged and end playback early.
    /// Returns the progress actually reached before the final sample.
    pub fn run(self, emit: impl FnMut(ProgressSample)) -> f64 {
        let mut reporter = Reporter {
            handle: &self.handle,
            steps: self.settings.progress_steps.max(1) as f64,
            duration: self
                .sound
                .duration_ms
                .map(Duration::from_millis)
                .unwrap_or_default(),
            last: None,
            reached: 0.0,
            emit,
        };

        let mut stream: Option<Box<dyn OutputStream>> = None;
        match self.stream_to_device(&mut stream, &mut reporter) {
            Ok(()) => debug!(
                "Player {} finished '{}' at {:.2}",
                self.handle.id, self.sound.name, reporter.reached
            ),
            Err(e) => error!("Playback of '{}' failed: {e}", self.sound.name),
        }
        if let Some(mut stream) = stream {
            stream.close();
        }
        reporter.send(1.0);
        reporter.reached
    }

    fn stream_to_device<F: FnMut(ProgressSample)>(
        &self,
        slot: &mut Option<Box<dyn OutputStream>>,
        reporter: &mut Reporter<'_, F>,
    ) -> Result<(), PlaybackError> {
        let mut reader = WavReader::open(&self.sound.path)?;
        let spec = reader.spec();
        let duration = reader.duration();
        reporter.duration = duration;

        let chunk_frames =
            ((spec.sample_rate as f64 * self.settings.chunk.as_secs_f64()) as usize).max(1);
        let stream = slot.insert(self.device.open(StreamSpec {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            sample_width: spec.sample_width(),
        })?);

        let mut buf = Vec::new();
        let mut start: Option<Duration> = None;
        let mut progress = 0.0;
        while !self.handle.is_stopping() {
            if reader.read_frames(chunk_frames, &mut buf)? == 0 {
                break;
            }
            stream.write(&buf)?;
            let now = stream.elapsed();
            // The clock starts once the first chunk is queued.
            let start = *start.get_or_insert(now);
            if !duration.is_zero() {
                progress = now.saturating_sub(start).as_secs_f64() / duration.as_secs_f64();
                reporter.report(progress);
            }
        }

        // Everything is queued; keep reporting while the device buffer drains.
        if !self.handle.is_stopping() && !duration.is_zero() && progress < 1.0 {
            let remaining = duration.mul_f64(1.0 - progress.clamp(0.0, 1.0));
            let drain_start = Instant::now();
            while !self.handle.is_stopping() {
                let waited = drain_start.elapsed();
                if waited >= remaining {
                    break;
                }
                thread::sleep(self.settings.chunk.min(remaining - waited));
                let played = progress + drain_start.elapsed().as_secs_f64() / duration.as_secs_f64();
                reporter.report(played);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::SilentDevice;
    use crate::test_support::{sound_at, temp_dir, write_wav};

    fn settings() -> PlayerSettings {
        PlayerSettings {
            chunk: Duration::from_millis(10),
            progress_steps: 100,
        }
    }

    #[test]
    fn test_progress_is_monotonic_and_ends_at_one() {
        let dir = temp_dir();
        let path = dir.join("beep.wav");
        write_wav(&path, 1000, 1, &vec![0i16; 200]);

        let player = Player::new(sound_at(1, &path), Arc::new(SilentDevice::instant()), settings());
        let id = player.handle().id;
        let mut samples = Vec::new();
        let reached = player.run(|s| samples.push(s));

        assert!(reached > 0.8);
        assert!(samples.iter().all(|s| s.player_id == id && s.sound_id == 1));
        assert!(samples.windows(2).all(|w| w[0].progress <= w[1].progress));
        assert_eq!(samples.last().unwrap().progress, 1.0);
        assert_eq!(samples.last().unwrap().duration, Duration::from_millis(200));
    }

    #[test]
    fn test_missing_file_completes_immediately() {
        let sound = sound_at(2, std::path::Path::new("/nonexistent/gone.wav"));
        let player = Player::new(sound, Arc::new(SilentDevice::instant()), settings());
        let mut samples = Vec::new();
        let reached = player.run(|s| samples.push(s));
        assert_eq!(reached, 0.0);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].progress, 1.0);
    }

    #[test]
    fn test_unsupported_format_completes_immediately() {
        let dir = temp_dir();
        let path = dir.join("song.ogg");
        std::fs::write(&path, b"OggS").unwrap();
        let player = Player::new(sound_at(3, &path), Arc::new(SilentDevice::instant()), settings());
        let mut samples = Vec::new();
        player.run(|s| samples.push(s));
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_stop_is_observed_between_chunks() {
        let dir = temp_dir();
        let path = dir.join("long.wav");
        write_wav(&path, 1000, 1, &vec![0i16; 5000]);

        let player = Player::new(sound_at(4, &path), Arc::new(SilentDevice::realtime()), settings());
        let handle = player.handle();
        let worker = thread::spawn(move || player.run(|_| {}));
        thread::sleep(Duration::from_millis(50));
        let stopped_at = Instant::now();
        handle.stop();
        let reached = worker.join().unwrap();
        assert!(stopped_at.elapsed() < Duration::from_millis(500));
        assert!(reached < 0.5);
    }

    #[test]
    fn test_coarse_steps_emit_fewer_samples() {
        let dir = temp_dir();
        let path = dir.join("steps.wav");
        write_wav(&path, 1000, 1, &vec![0i16; 1000]);

        let coarse = PlayerSettings {
            chunk: Duration::from_millis(10),
            progress_steps: 4,
        };
        let player = Player::new(sound_at(5, &path), Arc::new(SilentDevice::instant()), coarse);
        let mut samples = Vec::new();
        player.run(|s| samples.push(s));
        // 0, 0.25, 0.5, 0.75, 1.0 at most, plus the forced final 1.0.
        assert!(samples.len() <= 6);
        assert!(samples.iter().all(|s| (s.progress * 4.0).fract() == 0.0));
    }
}
