//! # Library Model
//!
//! Plain data types shared by the library store, the virtualized list and the
//! playback engine. Nothing in here does I/O.
//!
//! ```text
//! CategoryWithSounds
//! ├── category: Option<Category>   // None for the flat "filtered" group
//! └── sounds: Vec<Sound>
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row colour scheme for a category and the sounds inside it.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    #[default]
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
}

/// What happens when the user activates a sound that is already playing.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RepressMode {
    /// Re-pressing stops every player of that sound.
    #[serde(rename = "stop")]
    #[default]
    Stop,
    /// Re-pressing stops the running players, then starts a fresh one.
    #[serde(rename = "restart")]
    Restart,
    /// Re-pressing starts one more concurrent player.
    #[serde(rename = "overdub")]
    Overdub,
}

impl RepressMode {
    /// Cycles to the next mode (wraps around)
    pub fn next(self) -> RepressMode {
        match self {
            RepressMode::Stop => RepressMode::Restart,
            RepressMode::Restart => RepressMode::Overdub,
            RepressMode::Overdub => RepressMode::Stop,
        }
    }

    /// Returns a human-readable label for display
    pub fn label(self) -> &'static str {
        match self {
            RepressMode::Stop => "Stop",
            RepressMode::Restart => "Restart",
            RepressMode::Overdub => "Overdub",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub order: i32,
    #[serde(default)]
    pub palette: Palette,
    #[serde(default = "default_expanded")]
    pub is_expanded: bool,
    #[serde(default)]
    pub is_default: bool,
    /// Derived when listing; not persisted.
    #[serde(skip)]
    pub sound_count: usize,
    /// Derived when listing; not persisted.
    #[serde(skip)]
    pub duration_ms: u64,
}

fn default_expanded() -> bool {
    true
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Sound {
    pub id: i64,
    pub name: String,
    pub path: PathBuf,
    pub category_id: i64,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub play_count: u32,
    pub added_at: DateTime<Utc>,
    /// Copied from the owning category when listing; not persisted.
    #[serde(skip)]
    pub palette: Palette,
}

impl Sound {
    /// Lower-cased file extension, used to pick a decoder.
    pub fn format(&self) -> String {
        extension_of(&self.path)
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_ms.map(|ms| ms as f64 / 1000.0)
    }
}

pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Input for creating a category; the store assigns the id.
#[derive(Clone, Debug)]
pub struct NewCategory {
    pub name: String,
    pub order: i32,
    pub palette: Palette,
    pub is_expanded: bool,
}

/// Input for registering a sound file; the store assigns the id.
#[derive(Clone, Debug)]
pub struct NewSound {
    pub name: String,
    pub path: PathBuf,
    pub category_id: Option<i64>,
    pub duration_ms: Option<u64>,
}

/// One display group: a category header (if any) and the sounds under it.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryWithSounds {
    pub category: Option<Category>,
    pub sounds: Vec<Sound>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repress_mode_cycles_through_three_states() {
        let start = RepressMode::Stop;
        assert_eq!(start.next(), RepressMode::Restart);
        assert_eq!(start.next().next(), RepressMode::Overdub);
        assert_eq!(start.next().next().next(), RepressMode::Stop);
    }

    #[test]
    fn test_repress_mode_serializes_lowercase() {
        let json = serde_json::to_string(&RepressMode::Overdub).unwrap();
        assert_eq!(json, "\"overdub\"");
    }

    #[test]
    fn test_sound_format_is_lowercased_extension() {
        let sound = Sound {
            id: 1,
            name: "Boing".into(),
            path: PathBuf::from("/tmp/Boing.WAV"),
            category_id: 0,
            duration_ms: Some(1500),
            play_count: 0,
            added_at: Utc::now(),
            palette: Palette::Blue,
        };
        assert_eq!(sound.format(), "wav");
        assert_eq!(sound.duration_seconds(), Some(1.5));
    }
}
