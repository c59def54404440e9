//! # Sound Library
//!
//! The persistence collaborator: categories, sounds and a small meta table,
//! exposed as CRUD plus change notification. The UI never reads the store
//! directly while drawing; it reloads a [`CategoryWithSounds`] snapshot
//! whenever a listener reports that a table changed.
//!
//! [`JsonLibrary`] keeps everything in memory and, when opened with a path,
//! mirrors it to a single JSON file (`~/.soundboard/library.json` by default).
//! Writes use atomic rename (write `.tmp`, then `rename()`) for crash safety.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::core::model::{
    Category, CategoryWithSounds, NewCategory, NewSound, Palette, RepressMode, Sound,
};

/// Which part of the store a mutation touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    Sounds,
    Categories,
    Meta,
}

/// Called after every successful mutating call.
pub type ChangeListener = Box<dyn FnMut(Table) + Send>;

#[derive(Debug)]
pub enum LibraryError {
    Io(io::Error),
    Parse(serde_json::Error),
    NotFound { kind: &'static str, id: i64 },
    Invalid(String),
}

impl fmt::Display for LibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryError::Io(e) => write!(f, "library I/O error: {e}"),
            LibraryError::Parse(e) => write!(f, "library parse error: {e}"),
            LibraryError::NotFound { kind, id } => write!(f, "{kind} {id} not found"),
            LibraryError::Invalid(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<io::Error> for LibraryError {
    fn from(e: io::Error) -> Self {
        LibraryError::Io(e)
    }
}

pub trait Library {
    /// Categories in display order, with derived sound count and total duration.
    fn list_categories(&self) -> Result<Vec<Category>, LibraryError>;
    /// All sounds, sorted by name, with their category's palette filled in.
    fn list_sounds(&self) -> Result<Vec<Sound>, LibraryError>;
    /// Case-insensitive substring match on the sound name.
    fn filter_sounds(&self, query: &str) -> Result<Vec<Sound>, LibraryError>;
    fn get_category(&self, id: i64) -> Result<Category, LibraryError>;
    fn get_sound(&self, id: i64) -> Result<Sound, LibraryError>;

    fn create_category(&mut self, new: NewCategory) -> Result<Category, LibraryError>;
    fn update_category(&mut self, category: &Category) -> Result<(), LibraryError>;
    /// Sounds in the deleted category move to the default category, or are
    /// deleted with it when there is none (or it is the default itself).
    fn delete_category(&mut self, id: i64) -> Result<(), LibraryError>;
    fn set_default_category(&mut self, id: Option<i64>) -> Result<(), LibraryError>;

    /// `category_id: None` files the sound under the default category.
    fn create_sound(&mut self, new: NewSound) -> Result<Sound, LibraryError>;
    fn update_sound(&mut self, sound: &Sound) -> Result<(), LibraryError>;
    fn delete_sound(&mut self, id: i64) -> Result<(), LibraryError>;
    /// Refile every sound in `ids` under `category_id`, all or nothing.
    fn move_sounds(&mut self, ids: &[i64], category_id: i64) -> Result<usize, LibraryError>;
    /// Delete every sound in `ids`, all or nothing.
    fn delete_sounds(&mut self, ids: &[i64]) -> Result<usize, LibraryError>;
    /// Returns the new play count.
    fn increment_play_count(&mut self, sound_id: i64) -> Result<u32, LibraryError>;

    fn repress_mode(&self) -> RepressMode;
    fn set_repress_mode(&mut self, mode: RepressMode) -> Result<(), LibraryError>;

    fn on_change(&mut self, listener: ChangeListener);

    fn default_category(&self) -> Result<Option<Category>, LibraryError> {
        Ok(self.list_categories()?.into_iter().find(|c| c.is_default))
    }

    fn get_or_create_default_category(&mut self) -> Result<Category, LibraryError> {
        if let Some(category) = self.default_category()? {
            return Ok(category);
        }
        let category = self.create_category(NewCategory {
            name: "Default".to_string(),
            order: 0,
            palette: Palette::Red,
            is_expanded: true,
        })?;
        self.set_default_category(Some(category.id))?;
        self.get_category(category.id)
    }

    /// Display groups. A non-empty query collapses everything into a single
    /// header-less group of matching sounds.
    fn list_grouped(&self, query: &str) -> Result<Vec<CategoryWithSounds>, LibraryError> {
        if !query.is_empty() {
            return Ok(vec![CategoryWithSounds {
                category: None,
                sounds: self.filter_sounds(query)?,
            }]);
        }

        let sounds = self.list_sounds()?;
        Ok(self
            .list_categories()?
            .into_iter()
            .map(|category| {
                let sounds = sounds
                    .iter()
                    .filter(|s| s.category_id == category.id)
                    .cloned()
                    .collect();
                CategoryWithSounds {
                    category: Some(category),
                    sounds,
                }
            })
            .collect())
    }
}

// ============================================================================
// JSON-backed implementation
// ============================================================================

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
struct Meta {
    #[serde(default)]
    repress_mode: RepressMode,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
struct LibraryData {
    #[serde(default)]
    meta: Meta,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    sounds: Vec<Sound>,
    #[serde(default)]
    next_id: i64,
}

pub struct JsonLibrary {
    data: LibraryData,
    path: Option<PathBuf>,
    listeners: Vec<ChangeListener>,
}

/// Returns `~/.soundboard/library.json`.
pub fn default_library_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".soundboard").join("library.json"))
}

/// Atomically write `data` as JSON to `path` (via `.tmp` + rename).
fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

impl LibraryData {
    fn next_id(&mut self) -> i64 {
        let max_existing = self
            .categories
            .iter()
            .map(|c| c.id)
            .chain(self.sounds.iter().map(|s| s.id))
            .max()
            .unwrap_or(0);
        self.next_id = self.next_id.max(max_existing) + 1;
        self.next_id
    }

    fn category_index(&self, id: i64) -> Result<usize, LibraryError> {
        self.categories
            .iter()
            .position(|c| c.id == id)
            .ok_or(LibraryError::NotFound {
                kind: "category",
                id,
            })
    }

    fn sound_index(&self, id: i64) -> Result<usize, LibraryError> {
        self.sounds
            .iter()
            .position(|s| s.id == id)
            .ok_or(LibraryError::NotFound { kind: "sound", id })
    }
}

impl JsonLibrary {
    /// A library that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            data: LibraryData::default(),
            path: None,
            listeners: Vec::new(),
        }
    }

    /// Open the library file at `path`, starting empty if it doesn't exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LibraryError> {
        let path = path.into();
        let data = if path.exists() {
            let json = fs::read_to_string(&path)?;
            let data: LibraryData = serde_json::from_str(&json).map_err(LibraryError::Parse)?;
            info!(
                "Loaded library from {} ({} categories, {} sounds)",
                path.display(),
                data.categories.len(),
                data.sounds.len()
            );
            data
        } else {
            info!("No library at {}, starting empty", path.display());
            LibraryData::default()
        };
        Ok(Self {
            data,
            path: Some(path),
            listeners: Vec::new(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Apply `edit` to a copy of the data, persist the copy (when
    /// file-backed), and only then make it current and notify listeners.
    /// Any error leaves the library exactly as it was.
    fn transact<R>(
        &mut self,
        tables: &[Table],
        edit: impl FnOnce(&mut LibraryData) -> Result<R, LibraryError>,
    ) -> Result<R, LibraryError> {
        let mut draft = self.data.clone();
        let out = edit(&mut draft)?;
        if let Some(path) = &self.path {
            if let Err(e) = atomic_write_json(path, &draft) {
                warn!("Library save to {} failed: {e}", path.display());
                return Err(e.into());
            }
            debug!("Library saved to {}", path.display());
        }
        self.data = draft;
        for table in tables {
            for listener in &mut self.listeners {
                listener(*table);
            }
        }
        Ok(out)
    }

    fn palette_of(&self, category_id: i64) -> Palette {
        self.data
            .categories
            .iter()
            .find(|c| c.id == category_id)
            .map(|c| c.palette)
            .unwrap_or_default()
    }

    fn decorate(&self, sound: &Sound) -> Sound {
        let mut sound = sound.clone();
        sound.palette = self.palette_of(sound.category_id);
        sound
    }

    fn sorted_sounds<'a>(&self, sounds: impl Iterator<Item = &'a Sound>) -> Vec<Sound> {
        let mut sounds: Vec<Sound> = sounds.map(|s| self.decorate(s)).collect();
        sounds.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        sounds
    }
}

impl Library for JsonLibrary {
    fn list_categories(&self) -> Result<Vec<Category>, LibraryError> {
        let mut categories: Vec<Category> = self
            .data
            .categories
            .iter()
            .map(|c| {
                let mut category = c.clone();
                let sounds = self.data.sounds.iter().filter(|s| s.category_id == c.id);
                category.sound_count = 0;
                category.duration_ms = 0;
                for sound in sounds {
                    category.sound_count += 1;
                    category.duration_ms += sound.duration_ms.unwrap_or(0);
                }
                category
            })
            .collect();
        categories.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));
        Ok(categories)
    }

    fn list_sounds(&self) -> Result<Vec<Sound>, LibraryError> {
        Ok(self.sorted_sounds(self.data.sounds.iter()))
    }

    fn filter_sounds(&self, query: &str) -> Result<Vec<Sound>, LibraryError> {
        let needle = query.to_lowercase();
        Ok(self.sorted_sounds(
            self.data
                .sounds
                .iter()
                .filter(|s| s.name.to_lowercase().contains(&needle)),
        ))
    }

    fn get_category(&self, id: i64) -> Result<Category, LibraryError> {
        self.data.category_index(id)?;
        self.list_categories()?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or(LibraryError::NotFound {
                kind: "category",
                id,
            })
    }

    fn get_sound(&self, id: i64) -> Result<Sound, LibraryError> {
        let idx = self.data.sound_index(id)?;
        Ok(self.decorate(&self.data.sounds[idx]))
    }

    fn create_category(&mut self, new: NewCategory) -> Result<Category, LibraryError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(LibraryError::Invalid("category name cannot be empty".into()));
        }
        let category = self.transact(&[Table::Categories], |data| {
            // Inserting at an occupied order shifts the rest down.
            for existing in &mut data.categories {
                if existing.order >= new.order {
                    existing.order += 1;
                }
            }
            let category = Category {
                id: data.next_id(),
                name: name.to_string(),
                order: new.order,
                palette: new.palette,
                is_expanded: new.is_expanded,
                is_default: false,
                sound_count: 0,
                duration_ms: 0,
            };
            data.categories.push(category.clone());
            Ok(category)
        })?;
        info!("Created category {} ({})", category.name, category.id);
        Ok(category)
    }

    fn update_category(&mut self, category: &Category) -> Result<(), LibraryError> {
        self.transact(&[Table::Categories], |data| {
            let idx = data.category_index(category.id)?;
            let stored = &mut data.categories[idx];
            stored.name = category.name.clone();
            stored.order = category.order;
            stored.palette = category.palette;
            stored.is_expanded = category.is_expanded;
            Ok(())
        })
    }

    fn delete_category(&mut self, id: i64) -> Result<(), LibraryError> {
        let removed = self.transact(&[Table::Categories, Table::Sounds], |data| {
            let idx = data.category_index(id)?;
            let removed = data.categories.remove(idx);
            let fallback = data.categories.iter().find(|c| c.is_default).map(|c| c.id);
            match fallback {
                Some(default_id) => {
                    for sound in &mut data.sounds {
                        if sound.category_id == id {
                            sound.category_id = default_id;
                        }
                    }
                }
                None => data.sounds.retain(|s| s.category_id != id),
            }
            Ok(removed)
        })?;
        info!("Deleted category {} ({})", removed.name, removed.id);
        Ok(())
    }

    fn set_default_category(&mut self, id: Option<i64>) -> Result<(), LibraryError> {
        self.transact(&[Table::Categories], |data| {
            if let Some(id) = id {
                data.category_index(id)?;
            }
            for category in &mut data.categories {
                category.is_default = Some(category.id) == id;
            }
            Ok(())
        })
    }

    fn create_sound(&mut self, new: NewSound) -> Result<Sound, LibraryError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(LibraryError::Invalid("sound name cannot be empty".into()));
        }
        let category_id = match new.category_id {
            Some(id) => {
                self.data.category_index(id)?;
                id
            }
            None => self.get_or_create_default_category()?.id,
        };
        let sound = self.transact(&[Table::Sounds], |data| {
            let sound = Sound {
                id: data.next_id(),
                name: name.to_string(),
                path: new.path,
                category_id,
                duration_ms: new.duration_ms,
                play_count: 0,
                added_at: Utc::now(),
                palette: Palette::default(),
            };
            data.sounds.push(sound.clone());
            Ok(sound)
        })?;
        Ok(self.decorate(&sound))
    }

    fn update_sound(&mut self, sound: &Sound) -> Result<(), LibraryError> {
        self.transact(&[Table::Sounds], |data| {
            data.category_index(sound.category_id)?;
            let idx = data.sound_index(sound.id)?;
            let stored = &mut data.sounds[idx];
            stored.name = sound.name.clone();
            stored.path = sound.path.clone();
            stored.category_id = sound.category_id;
            stored.duration_ms = sound.duration_ms;
            stored.play_count = sound.play_count;
            Ok(())
        })
    }

    fn delete_sound(&mut self, id: i64) -> Result<(), LibraryError> {
        self.delete_sounds(&[id]).map(|_| ())
    }

    fn move_sounds(&mut self, ids: &[i64], category_id: i64) -> Result<usize, LibraryError> {
        let moved = self.transact(&[Table::Sounds], |data| {
            data.category_index(category_id)?;
            for &id in ids {
                let idx = data.sound_index(id)?;
                data.sounds[idx].category_id = category_id;
            }
            Ok(ids.len())
        })?;
        info!("Moved {moved} sounds to category {category_id}");
        Ok(moved)
    }

    fn delete_sounds(&mut self, ids: &[i64]) -> Result<usize, LibraryError> {
        self.transact(&[Table::Sounds], |data| {
            for &id in ids {
                data.sound_index(id)?;
            }
            data.sounds.retain(|s| !ids.contains(&s.id));
            Ok(ids.len())
        })
    }

    fn increment_play_count(&mut self, sound_id: i64) -> Result<u32, LibraryError> {
        self.transact(&[Table::Sounds], |data| {
            let idx = data.sound_index(sound_id)?;
            data.sounds[idx].play_count += 1;
            Ok(data.sounds[idx].play_count)
        })
    }

    fn repress_mode(&self) -> RepressMode {
        self.data.meta.repress_mode
    }

    fn set_repress_mode(&mut self, mode: RepressMode) -> Result<(), LibraryError> {
        if self.data.meta.repress_mode == mode {
            return Ok(());
        }
        self.transact(&[Table::Meta], |data| {
            data.meta.repress_mode = mode;
            Ok(())
        })
    }

    fn on_change(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }
}
