//! Non-interactive subcommands: inspect and maintain the library without
//! starting the TUI. Output goes to any writer so the commands are testable.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::audio::wav::read_duration;
use crate::core::format::format_millis;
use crate::core::library::{Library, LibraryError};
use crate::core::model::{Category, NewCategory, NewSound, Palette};

const PALETTES: [Palette; 6] = [
    Palette::Red,
    Palette::Green,
    Palette::Yellow,
    Palette::Blue,
    Palette::Magenta,
    Palette::Cyan,
];

pub fn list_categories(library: &dyn Library, out: &mut dyn Write) -> Result<(), LibraryError> {
    for category in library.list_categories()? {
        writeln!(
            out,
            "{:>4}  {:<24} {:>4} sounds  {:>10}{}",
            category.id,
            category.name,
            category.sound_count,
            format_millis(category.duration_ms),
            if category.is_default { "  (default)" } else { "" }
        )?;
    }
    Ok(())
}

pub fn list_sounds(library: &dyn Library, out: &mut dyn Write) -> Result<(), LibraryError> {
    for group in library.list_grouped("")? {
        let Some(category) = group.category else {
            continue;
        };
        writeln!(out, "[{}]", category.name)?;
        for sound in group.sounds {
            writeln!(
                out,
                "{:>4}  {:<32} {:>10}  {:>4} plays  {}",
                sound.id,
                sound.name,
                sound.duration_ms.map(format_millis).unwrap_or_default(),
                sound.play_count,
                sound.path.display()
            )?;
        }
    }
    Ok(())
}

/// Delete every sound whose file no longer exists. Returns how many went.
pub fn clear_orphans(library: &mut dyn Library, out: &mut dyn Write) -> Result<usize, LibraryError> {
    let orphans: Vec<_> = library
        .list_sounds()?
        .into_iter()
        .filter(|s| !s.path.exists())
        .collect();
    for sound in &orphans {
        library.delete_sound(sound.id)?;
        writeln!(out, "removed {} ({})", sound.name, sound.path.display())?;
    }
    info!("Cleared {} orphaned sounds", orphans.len());
    Ok(orphans.len())
}

/// Options for [`add`].
#[derive(Debug, Default, Clone)]
pub struct AddOptions {
    /// File into this category, creating it if needed. Default category otherwise.
    pub category: Option<String>,
    /// Register a path even if a sound already points at it.
    pub allow_duplicates: bool,
}

fn find_or_create_category(
    library: &mut dyn Library,
    name: &str,
) -> Result<Category, LibraryError> {
    let categories = library.list_categories()?;
    if let Some(category) = categories.iter().find(|c| c.name.eq_ignore_ascii_case(name)) {
        return Ok(category.clone());
    }
    let order = categories.iter().map(|c| c.order).max().map_or(0, |o| o + 1);
    library.create_category(NewCategory {
        name: name.to_string(),
        order,
        palette: PALETTES[categories.len() % PALETTES.len()],
        is_expanded: true,
    })
}

/// Register sound files. Missing files and (unless allowed) duplicates are
/// skipped with a message. Returns how many were added.
pub fn add(
    library: &mut dyn Library,
    paths: &[PathBuf],
    options: &AddOptions,
    out: &mut dyn Write,
) -> Result<usize, LibraryError> {
    let category = match &options.category {
        Some(name) => find_or_create_category(library, name)?,
        None => library.get_or_create_default_category()?,
    };
    let mut known: Vec<PathBuf> = library.list_sounds()?.into_iter().map(|s| s.path).collect();

    let mut added = 0;
    for path in paths {
        let path = absolute(path);
        if !path.is_file() {
            writeln!(out, "skipped {}: no such file", path.display())?;
            continue;
        }
        if !options.allow_duplicates && known.contains(&path) {
            writeln!(out, "skipped {}: already in the library", path.display())?;
            continue;
        }
        let duration_ms = match read_duration(&path) {
            Ok(duration) => Some(duration.as_millis() as u64),
            Err(e) => {
                warn!("No duration for {}: {e}", path.display());
                None
            }
        };
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let sound = library.create_sound(NewSound {
            name,
            path: path.clone(),
            category_id: Some(category.id),
            duration_ms,
        })?;
        writeln!(out, "added {} to {}", sound.name, category.name)?;
        known.push(path);
        added += 1;
    }
    Ok(added)
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
