//! Audio device collaborator.
//!
//! A device opens blocking output streams. `write` returns once the device
//! has room for the samples, so a player that writes fixed-size chunks in a
//! loop is paced by the device clock. `elapsed` is the stream's playback
//! clock, which players turn into a progress fraction.
//!
//! Streams are opened and dropped on the worker thread that plays them, so
//! [`OutputStream`] is not required to be `Send`.

use std::thread;
use std::time::{Duration, Instant};

use crate::audio::PlaybackError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub channels: u16,
    /// Bytes per sample in the source file.
    pub sample_width: u16,
}

impl StreamSpec {
    pub fn frames_to_duration(&self, frames: u64) -> Duration {
        Duration::from_nanos(frames * 1_000_000_000 / self.sample_rate.max(1) as u64)
    }
}

pub trait AudioDevice: Send + Sync {
    fn open(&self, spec: StreamSpec) -> Result<Box<dyn OutputStream>, PlaybackError>;

    fn name(&self) -> &'static str;
}

pub trait OutputStream {
    /// Queue interleaved samples, blocking while the device buffer is full.
    /// Returns the number of frames written.
    fn write(&mut self, samples: &[f32]) -> Result<usize, PlaybackError>;

    /// Time played on this stream so far.
    fn elapsed(&self) -> Duration;

    fn close(&mut self);
}

// ============================================================================
// Silent device
// ============================================================================

/// How a [`SilentDevice`] stream advances its clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pacing {
    /// Wall-clock pacing with one chunk of buffering, like a real device.
    Realtime,
    /// No sleeping; the clock is the number of frames written.
    Instant,
}

/// Discards samples but keeps time, for machines without audio output
/// and for tests.
#[derive(Clone, Copy, Debug)]
pub struct SilentDevice {
    pacing: Pacing,
}

impl SilentDevice {
    pub fn realtime() -> Self {
        Self {
            pacing: Pacing::Realtime,
        }
    }

    pub fn instant() -> Self {
        Self {
            pacing: Pacing::Instant,
        }
    }
}

impl AudioDevice for SilentDevice {
    fn open(&self, spec: StreamSpec) -> Result<Box<dyn OutputStream>, PlaybackError> {
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(PlaybackError::Device(format!(
                "cannot open {} channels at {} Hz",
                spec.channels, spec.sample_rate
            )));
        }
        Ok(Box::new(SilentStream {
            spec,
            pacing: self.pacing,
            frames_written: 0,
            started: None,
            closed: false,
        }))
    }

    fn name(&self) -> &'static str {
        "silent"
    }
}

struct SilentStream {
    spec: StreamSpec,
    pacing: Pacing,
    frames_written: u64,
    started: Option<Instant>,
    closed: bool,
}

impl OutputStream for SilentStream {
    fn write(&mut self, samples: &[f32]) -> Result<usize, PlaybackError> {
        if self.closed {
            return Err(PlaybackError::Device("write on closed stream".into()));
        }
        let frames = samples.len() / self.spec.channels as usize;
        if self.pacing == Pacing::Realtime {
            let started = *self.started.get_or_insert_with(Instant::now);
            // Block until everything queued before this chunk has played.
            let due = started + self.spec.frames_to_duration(self.frames_written);
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }
        self.frames_written += frames as u64;
        Ok(frames)
    }

    fn elapsed(&self) -> Duration {
        match self.pacing {
            Pacing::Realtime => self.started.map(|s| s.elapsed()).unwrap_or_default(),
            Pacing::Instant => self.spec.frames_to_duration(self.frames_written),
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

// ============================================================================
// cpal device
// ============================================================================

#[cfg(feature = "cpal")]
pub use self::cpal_device::CpalDevice;

#[cfg(feature = "cpal")]
mod cpal_device {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use log::{error, warn};
    use ringbuf::traits::{Consumer, Producer, Split};
    use ringbuf::{HeapProd, HeapRb};

    use super::{AudioDevice, OutputStream, StreamSpec};
    use crate::audio::PlaybackError;

    /// The host's default output device.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct CpalDevice;

    impl CpalDevice {
        pub fn new() -> Self {
            Self
        }
    }

    impl AudioDevice for CpalDevice {
        fn open(&self, spec: StreamSpec) -> Result<Box<dyn OutputStream>, PlaybackError> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| PlaybackError::Device("no output device available".into()))?;

            let config = cpal::StreamConfig {
                channels: spec.channels,
                sample_rate: cpal::SampleRate(spec.sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            // Ring buffer: the player writes, the audio callback reads. ~200ms.
            let capacity = ((spec.sample_rate as usize * spec.channels as usize) / 5).max(4096);
            let ring = HeapRb::<f32>::new(capacity);
            let (producer, mut consumer) = ring.split();

            let played = Arc::new(AtomicU64::new(0));
            let played_cb = Arc::clone(&played);
            let channels = spec.channels as usize;

            let stream = device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let read = consumer.pop_slice(data);
                        for sample in data[read..].iter_mut() {
                            *sample = 0.0;
                        }
                        played_cb.fetch_add((read / channels) as u64, Ordering::Relaxed);
                    },
                    |err| error!("Audio stream error: {err}"),
                    None,
                )
                .map_err(|e| PlaybackError::Device(format!("failed to build stream: {e}")))?;
            stream
                .play()
                .map_err(|e| PlaybackError::Device(format!("failed to start stream: {e}")))?;

            Ok(Box::new(CpalStream {
                spec,
                stream: Some(stream),
                producer,
                played,
            }))
        }

        fn name(&self) -> &'static str {
            "cpal"
        }
    }

    /// A device that drains nothing for this long is treated as gone.
    const STALL_TIMEOUT: Duration = Duration::from_secs(2);

    /// Feed `samples` through `push`, waiting while the ring buffer is full.
    /// Fails once `push` has accepted nothing for `stall`.
    pub(super) fn push_blocking(
        mut push: impl FnMut(&[f32]) -> usize,
        samples: &[f32],
        stall: Duration,
    ) -> Result<(), PlaybackError> {
        let mut rest = samples;
        let mut last_progress = Instant::now();
        while !rest.is_empty() {
            let written = push(rest);
            rest = &rest[written..];
            if written > 0 {
                last_progress = Instant::now();
            } else if last_progress.elapsed() >= stall {
                return Err(PlaybackError::Device(format!(
                    "output stalled with {} samples pending",
                    rest.len()
                )));
            }
            if !rest.is_empty() {
                thread::sleep(Duration::from_millis(2));
            }
        }
        Ok(())
    }

    struct CpalStream {
        spec: StreamSpec,
        stream: Option<cpal::Stream>,
        producer: HeapProd<f32>,
        played: Arc<AtomicU64>,
    }

    impl OutputStream for CpalStream {
        fn write(&mut self, samples: &[f32]) -> Result<usize, PlaybackError> {
            if self.stream.is_none() {
                return Err(PlaybackError::Device("write on closed stream".into()));
            }
            let producer = &mut self.producer;
            push_blocking(|chunk| producer.push_slice(chunk), samples, STALL_TIMEOUT)?;
            Ok(samples.len() / self.spec.channels as usize)
        }

        fn elapsed(&self) -> Duration {
            self.spec
                .frames_to_duration(self.played.load(Ordering::Relaxed))
        }

        fn close(&mut self) {
            if let Some(stream) = self.stream.take() {
                if let Err(e) = stream.pause() {
                    warn!("Failed to pause audio stream: {e}");
                }
            }
        }
    }
}
