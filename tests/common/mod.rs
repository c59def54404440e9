//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use soundboard::core::model::{Category, CategoryWithSounds, Palette, Sound};

pub fn category(id: i64, name: &str) -> Category {
    Category {
        id,
        name: name.to_string(),
        order: id as i32,
        palette: Palette::Cyan,
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
        palette: Palette::Cyan,
    }
}

/// `categories` groups, each expanded with `per_category` sounds.
pub fn groups(categories: usize, per_category: usize) -> Vec<CategoryWithSounds> {
    let mut next_id = 1000;
    (0..categories as i64)
        .map(|c| {
            let sounds = (0..per_category)
                .map(|i| {
                    next_id += 1;
                    sound(next_id, &format!("c{c} s{i}"), c)
                })
                .collect();
            CategoryWithSounds {
                category: Some(category(c, &format!("cat {c}"))),
                sounds,
            }
        })
        .collect()
}

pub fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("soundboard-it-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// A silent 16-bit mono WAV of `millis` at 1 kHz.
pub fn write_wav(path: &Path, millis: u32) {
    let frames = millis;
    let data_len = frames * 2;
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1000u32.to_le_bytes());
    out.extend_from_slice(&2000u32.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(out.len() + data_len as usize, 0);
    fs::write(path, out).unwrap();
}
