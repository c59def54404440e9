use std::fs::{self, File};
use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

use soundboard::commands::{self, AddOptions};
use soundboard::core::config::{self, CliOverrides, DeviceKind};
use soundboard::core::library::{JsonLibrary, default_library_path};
use soundboard::tui;

#[derive(Parser)]
#[command(name = "soundboard", about = "Terminal soundboard")]
struct Args {
    /// Library file (default: ~/.soundboard/library.json)
    #[arg(short, long)]
    library: Option<PathBuf>,

    /// Maximum number of sounds playing at once
    #[arg(short, long)]
    workers: Option<usize>,

    /// Audio output: "cpal" or "silent"
    #[arg(short, long)]
    device: Option<DeviceKind>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print every category with its sound count and total duration
    ListCategories,
    /// Print every sound, grouped by category
    ListSounds,
    /// Remove sounds whose file no longer exists
    ClearOrphans,
    /// Register sound files
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Category to file them under (created if missing)
        #[arg(short, long)]
        category: Option<String>,
        /// Add files that are already in the library again
        #[arg(long)]
        duplicates: bool,
    },
}

/// Start the file logger before anything else runs, so config warnings are
/// kept. The logger itself accepts everything; the global max level filters.
fn init_logging(level: LevelFilter) {
    let Some(dir) = config::config_dir() else {
        return;
    };
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Ok(log_file) = File::create(dir.join("soundboard.log")) {
        let _ = WriteLogger::init(LevelFilter::Trace, log_config, log_file);
        log::set_max_level(level);
    }
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();
    init_logging(config::startup_log_level(args.verbose));

    let file_config = config::load_config().map_err(io::Error::other)?;
    let resolved = config::resolve(
        &file_config,
        &CliOverrides {
            library: args.library,
            workers: args.workers,
            device: args.device,
            verbose: args.verbose,
        },
    );
    log::set_max_level(resolved.log_level);
    log::info!(
        "Soundboard starting up (device={}, workers={})",
        resolved.device,
        resolved.workers
    );

    let library_path = resolved
        .library_path
        .clone()
        .or_else(default_library_path)
        .ok_or_else(|| io::Error::other("cannot determine the library location; pass --library"))?;
    let mut library = JsonLibrary::open(&library_path).map_err(io::Error::other)?;

    let mut out = io::stdout().lock();
    match args.command {
        None => {
            drop(out);
            tui::run(&resolved, Box::new(library))
        }
        Some(Command::ListCategories) => {
            commands::list_categories(&library, &mut out).map_err(io::Error::other)
        }
        Some(Command::ListSounds) => {
            commands::list_sounds(&library, &mut out).map_err(io::Error::other)
        }
        Some(Command::ClearOrphans) => commands::clear_orphans(&mut library, &mut out)
            .map(|_| ())
            .map_err(io::Error::other),
        Some(Command::Add {
            paths,
            category,
            duplicates,
        }) => {
            let options = AddOptions {
                category,
                allow_duplicates: duplicates,
            };
            commands::add(&mut library, &paths, &options, &mut out)
                .map(|_| ())
                .map_err(io::Error::other)
        }
    }
}
