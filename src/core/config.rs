//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.soundboard/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SoundboardConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub library_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PlaybackConfig {
    pub workers: Option<usize>,
    pub chunk_ms: Option<u64>,
    pub progress_steps: Option<u32>,
    pub device: Option<DeviceKind>,
}

/// Which audio output the engine opens streams on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Paces writes in real time without producing sound.
    Silent,
    /// The system's default output device.
    Cpal,
}

impl Default for DeviceKind {
    fn default() -> Self {
        if cfg!(feature = "cpal") {
            DeviceKind::Cpal
        } else {
            DeviceKind::Silent
        }
    }
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "silent" => Ok(DeviceKind::Silent),
            "cpal" => Ok(DeviceKind::Cpal),
            other => Err(format!("unknown device '{other}' (expected silent or cpal)")),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Silent => write!(f, "silent"),
            DeviceKind::Cpal => write!(f, "cpal"),
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_WORKERS: usize = 10;
/// Audio written per device call; also the worst-case stop latency.
pub const DEFAULT_CHUNK_MS: u64 = 100;
pub const DEFAULT_PROGRESS_STEPS: u32 = 100;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub library_path: Option<PathBuf>,
    pub log_level: log::LevelFilter,
    pub workers: usize,
    pub chunk_ms: u64,
    pub progress_steps: u32,
    pub device: DeviceKind,
}

/// Values given on the command line (None = not specified).
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub library: Option<PathBuf>,
    pub workers: Option<usize>,
    pub device: Option<DeviceKind>,
    pub verbose: bool,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns `~/.soundboard`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".soundboard"))
}

/// Returns the path to `~/.soundboard/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load config from `~/.soundboard/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `SoundboardConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<SoundboardConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(SoundboardConfig::default());
        }
    };
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<SoundboardConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(SoundboardConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: SoundboardConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Soundboard Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# library_path = "/home/me/.soundboard/library.json"   # Or SOUNDBOARD_LIBRARY
# log_level = "info"                                     # "debug", "info", "warn", "error"

# [playback]
# workers = 10            # Max concurrent players. Or SOUNDBOARD_WORKERS
# chunk_ms = 100          # Audio per write; a stop takes effect within one chunk
# progress_steps = 100    # Progress display resolution
# device = "cpal"         # "cpal" or "silent". Or SOUNDBOARD_DEVICE
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Level used while the config itself is still being loaded.
pub fn startup_log_level(verbose: bool) -> log::LevelFilter {
    if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &SoundboardConfig, cli: &CliOverrides) -> ResolvedConfig {
    // Library: CLI → env → config → (library default path, decided by caller)
    let library_path = cli
        .library
        .clone()
        .or_else(|| env_var("SOUNDBOARD_LIBRARY").map(PathBuf::from))
        .or_else(|| config.general.library_path.clone());

    let workers = cli
        .workers
        .or_else(|| {
            env_var("SOUNDBOARD_WORKERS").and_then(|v| match v.parse() {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("Ignoring SOUNDBOARD_WORKERS={v}: {e}");
                    None
                }
            })
        })
        .or(config.playback.workers)
        .unwrap_or(DEFAULT_WORKERS)
        .max(1);

    let device = cli
        .device
        .or_else(|| {
            env_var("SOUNDBOARD_DEVICE").and_then(|v| match v.parse() {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!("Ignoring SOUNDBOARD_DEVICE: {e}");
                    None
                }
            })
        })
        .or(config.playback.device)
        .unwrap_or_default();

    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        config
            .general
            .log_level
            .as_deref()
            .and_then(|l| l.parse().ok())
            .unwrap_or(startup_log_level(false))
    };

    ResolvedConfig {
        library_path,
        log_level,
        workers,
        chunk_ms: config
            .playback
            .chunk_ms
            .unwrap_or(DEFAULT_CHUNK_MS)
            .max(1),
        progress_steps: config
            .playback
            .progress_steps
            .unwrap_or(DEFAULT_PROGRESS_STEPS)
            .max(1),
        device,
    }
}
