//! Per-sound playback progress, as shown next to list rows and in the
//! bottom bar.
//!
//! Several players may target the same sound (overdub). Only the sample from
//! the most recently *created* player is kept per sound id, and a sample from
//! an older player never replaces a newer one, whatever order the worker
//! threads deliver them in. When that newest player finishes, the sound
//! drops out of the collection even if an older overdub player is still
//! running; the older player's next sample brings it back only if its
//! `created_at` is not older than what is stored.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressSample {
    pub player_id: Uuid,
    pub sound_id: i64,
    /// When the emitting player was created.
    pub created_at: Instant,
    /// When this sample was taken.
    pub sampled_at: Instant,
    /// Fraction played, in `[0, 1]`.
    pub progress: f64,
    pub duration: Duration,
}

impl ProgressSample {
    /// Estimated wall-clock end of the emitting player.
    pub fn ends(&self) -> Instant {
        let remaining = (1.0 - self.progress).clamp(0.0, 1.0);
        self.sampled_at + self.duration.mul_f64(remaining)
    }
}

#[derive(Debug, Default)]
pub struct ProgressCollection {
    samples: HashMap<i64, ProgressSample>,
}

impl ProgressCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `sample` unless a sample from a newer player is already held.
    /// Ties overwrite. Returns whether the sample was stored.
    pub fn append(&mut self, sample: ProgressSample) -> bool {
        match self.samples.get(&sample.sound_id) {
            Some(stored) if stored.created_at > sample.created_at => false,
            _ => {
                self.samples.insert(sample.sound_id, sample);
                true
            }
        }
    }

    pub fn get(&self, sound_id: i64) -> Option<&ProgressSample> {
        self.samples.get(&sound_id)
    }

    pub fn progress_of(&self, sound_id: i64) -> Option<f64> {
        self.get(sound_id).map(|s| s.progress)
    }

    pub fn contains(&self, sound_id: i64) -> bool {
        self.samples.contains_key(&sound_id)
    }

    /// Remove the entry for `sound_id` only if `player_id` still owns it.
    pub fn remove_if_owner(&mut self, sound_id: i64, player_id: Uuid) -> bool {
        match self.samples.get(&sound_id) {
            Some(stored) if stored.player_id == player_id => {
                self.samples.remove(&sound_id);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `(sound_id, progress)` pairs, unordered.
    pub fn items(&self) -> Vec<(i64, f64)> {
        self.samples
            .iter()
            .map(|(id, sample)| (*id, sample.progress))
            .collect()
    }

    /// Aggregate progress over everything currently playing: time since the
    /// earliest player started, divided by the span to the latest estimated
    /// end. `None` when nothing is playing.
    pub fn total(&self, now: Instant) -> Option<f64> {
        let start = self.samples.values().map(|s| s.created_at).min()?;
        let end = self.samples.values().map(ProgressSample::ends).max()?;
        let span = end.saturating_duration_since(start).as_secs_f64();
        if span <= 0.0 {
            return Some(1.0);
        }
        let elapsed = now.saturating_duration_since(start).as_secs_f64();
        Some((elapsed / span).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(player: Uuid, sound_id: i64, created: Instant, progress: f64) -> ProgressSample {
        ProgressSample {
            player_id: player,
            sound_id,
            created_at: created,
            sampled_at: created,
            progress,
            duration: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_append_is_idempotent() {
        let mut c = ProgressCollection::new();
        let s = sample(Uuid::new_v4(), 1, Instant::now(), 0.3);
        assert!(c.append(s));
        assert!(c.append(s));
        assert_eq!(c.len(), 1);
        assert_eq!(c.get(1), Some(&s));
    }

    #[test]
    fn test_older_sample_is_rejected() {
        let mut c = ProgressCollection::new();
        let t0 = Instant::now();
        let newer = sample(Uuid::new_v4(), 1, t0 + Duration::from_millis(500), 0.1);
        let older = sample(Uuid::new_v4(), 1, t0, 0.9);
        assert!(c.append(newer));
        assert!(!c.append(older));
        assert_eq!(c.progress_of(1), Some(0.1));
    }

    #[test]
    fn test_remove_only_by_owner() {
        let mut c = ProgressCollection::new();
        let owner = Uuid::new_v4();
        c.append(sample(owner, 7, Instant::now(), 0.5));
        assert!(!c.remove_if_owner(7, Uuid::new_v4()));
        assert!(c.contains(7));
        assert!(c.remove_if_owner(7, owner));
        assert!(c.is_empty());
    }

    #[test]
    fn test_overdub_hides_older_player_after_newer_finishes() {
        let mut c = ProgressCollection::new();
        let t0 = Instant::now();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        c.append(sample(first, 3, t0, 0.2));
        c.append(sample(second, 3, t0 + Duration::from_secs(1), 0.0));
        assert!(!c.append(sample(first, 3, t0, 0.3)));
        assert_eq!(c.get(3).unwrap().player_id, second);

        c.remove_if_owner(3, second);
        // First player is still running, but it now reappears on its next sample.
        assert!(!c.contains(3));
        assert!(c.append(sample(first, 3, t0, 0.4)));
    }

    #[test]
    fn test_total_spans_earliest_start_to_latest_end() {
        let mut c = ProgressCollection::new();
        let t0 = Instant::now();
        assert_eq!(c.total(t0), None);

        // Ends at t0 + 10s.
        c.append(sample(Uuid::new_v4(), 1, t0, 0.0));
        // Starts at t0 + 5s, ends at t0 + 15s.
        c.append(sample(Uuid::new_v4(), 2, t0 + Duration::from_secs(5), 0.0));

        let total = c.total(t0 + Duration::from_secs(6)).unwrap();
        assert!((total - 0.4).abs() < 1e-9);
        assert_eq!(c.total(t0 + Duration::from_secs(60)), Some(1.0));
    }

    #[test]
    fn test_ends_uses_remaining_fraction() {
        let t0 = Instant::now();
        let s = sample(Uuid::new_v4(), 1, t0, 0.75);
        assert_eq!(s.ends(), t0 + Duration::from_millis(2500));
    }
}
