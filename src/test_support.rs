//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::core::library::{JsonLibrary, Library};
use crate::core::model::{Category, CategoryWithSounds, NewCategory, NewSound, Palette, Sound};

pub fn category(id: i64, name: &str, order: i32) -> Category {
    Category {
        id,
        name: name.to_string(),
        order,
        palette: Palette::Blue,
        is_expanded: true,
        is_default: false,
        sound_count: 0,
        duration_ms: 0,
    }
}

pub fn sound(id: i64, name: &str, category_id: i64) -> Sound {
    Sound {
        id,
        name: name.to_string(),
        path: PathBuf::from(format!("/sounds/{name}.wav")),
        category_id,
        duration_ms: Some(1000),
        play_count: 0,
        added_at: Utc::now(),
        palette: Palette::Blue,
    }
}

/// A sound pointing at a real file.
pub fn sound_at(id: i64, path: &Path) -> Sound {
    Sound {
        path: path.to_path_buf(),
        ..sound(id, "test sound", 0)
    }
}

pub fn group(category: Category, sounds: Vec<Sound>) -> CategoryWithSounds {
    CategoryWithSounds {
        category: Some(category),
        sounds,
    }
}

/// A fresh, empty directory under the system temp dir.
pub fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("soundboard-test-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// A 16-bit PCM WAV file image.
pub fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let block_align = channels * 2;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
    fs::write(path, wav_bytes(sample_rate, channels, samples)).unwrap();
}

/// An in-memory library with two categories and a handful of sounds.
pub fn sample_library() -> JsonLibrary {
    let mut lib = JsonLibrary::in_memory();
    let effects = lib
        .create_category(NewCategory {
            name: "Effects".into(),
            order: 0,
            palette: Palette::Green,
            is_expanded: true,
        })
        .unwrap();
    let music = lib
        .create_category(NewCategory {
            name: "Music".into(),
            order: 1,
            palette: Palette::Magenta,
            is_expanded: true,
        })
        .unwrap();
    for (name, category) in [
        ("Airhorn", effects.id),
        ("Boing", effects.id),
        ("Crickets", effects.id),
        ("Fanfare", music.id),
        ("Sad trombone", music.id),
    ] {
        lib.create_sound(NewSound {
            name: name.into(),
            path: PathBuf::from(format!("/sounds/{name}.wav")),
            category_id: Some(category),
            duration_ms: Some(2500),
        })
        .unwrap();
    }
    lib
}
