//! # Playback Engine
//!
//! Streams sounds to an audio device on a bounded pool of blocking workers
//! and reports progress back to the UI thread over a channel.
//!
//! ```text
//!   UI thread                         worker pool (spawn_blocking)
//!  ┌──────────┐  activate(sound)     ┌─────────┐ ┌─────────┐
//!  │  Engine  │ ───────────────────▶ │ Player  │ │ Player  │ ...
//!  │          │                      └────┬────┘ └────┬────┘
//!  │ active + │◀── remove on finish ──────┤           │
//!  │ progress │                           │ write chunk, sample clock
//!  └────▲─────┘                           ▼           ▼
//!       │            mpsc::Receiver<PlayerEvent>  (Progress | Finished)
//!       └──────────── drained by the UI loop every iteration
//! ```
//!
//! Workers never touch the terminal. The only state they mutate directly is
//! the engine's active set and its [`ProgressCollection`](crate::core::progress::ProgressCollection),
//! both behind one mutex.
//!
//! ## Modules
//!
//! - [`wav`]: PCM WAV reader and duration reader
//! - [`device`]: audio device collaborator (silent clock device, optional cpal)
//! - [`player`]: one streaming playback
//! - [`engine`]: pool, active set, repress policy

pub mod device;
pub mod engine;
pub mod player;
pub mod wav;

use std::fmt;
use std::io;
use std::sync::Arc;

pub use device::{AudioDevice, OutputStream, SilentDevice, StreamSpec};
pub use engine::{Engine, EngineOptions, PlayerEvent};

use crate::core::config::DeviceKind;

/// The output device for `kind`. Asking for cpal in a build without the
/// `cpal` feature is an error rather than a silent downgrade.
pub fn output_device(kind: DeviceKind) -> Result<Arc<dyn AudioDevice>, PlaybackError> {
    match kind {
        DeviceKind::Silent => Ok(Arc::new(SilentDevice::realtime())),
        #[cfg(feature = "cpal")]
        DeviceKind::Cpal => Ok(Arc::new(device::CpalDevice::new())),
        #[cfg(not(feature = "cpal"))]
        DeviceKind::Cpal => Err(PlaybackError::Device(
            "this build has no cpal support; rebuild with the `cpal` feature or use --device silent"
                .into(),
        )),
    }
}

#[derive(Debug)]
pub enum PlaybackError {
    Io(io::Error),
    /// File type we have no decoder for.
    Unsupported(String),
    /// Not a well-formed WAV file.
    Malformed(String),
    Device(String),
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackError::Io(e) => write!(f, "audio I/O error: {e}"),
            PlaybackError::Unsupported(what) => write!(f, "unsupported audio format: {what}"),
            PlaybackError::Malformed(msg) => write!(f, "malformed WAV: {msg}"),
            PlaybackError::Device(msg) => write!(f, "audio device error: {msg}"),
        }
    }
}

impl std::error::Error for PlaybackError {}

impl From<io::Error> for PlaybackError {
    fn from(e: io::Error) -> Self {
        PlaybackError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_device_is_always_available() {
        assert_eq!(output_device(DeviceKind::Silent).unwrap().name(), "silent");
    }

    #[cfg(feature = "cpal")]
    #[test]
    fn test_cpal_device_is_selected() {
        assert_eq!(output_device(DeviceKind::Cpal).unwrap().name(), "cpal");
    }

    #[cfg(not(feature = "cpal"))]
    #[test]
    fn test_cpal_request_without_support_is_refused() {
        assert!(matches!(
            output_device(DeviceKind::Cpal),
            Err(PlaybackError::Device(_))
        ));
    }
}
