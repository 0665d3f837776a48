//! pathedit - command line host for the search path engine
//!
//! # Overview
//!
//! Loads the system and user path from the configured store (or the process `PATH`) into
//! a [`PathEditorState`] and runs one command against it:
//!
//! - `check`: scan for missing directories and shadowed executables
//! - `search <prefix>`: list executables on the path starting with a prefix
//! - `discover <root>`: find `bin` directories below a root, optionally adding them
//!
//! # Configuration Files
//!
//! Expected in the configuration directory (`--config-dir`, default `.pathedit`):
//! - `pathedit.yaml`: settings, overridable with `PATHEDIT__*` environment variables
//! - `paths.yaml`: the stored system and user path
//! - `logs/`: daily rotated log files

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use pathedit::models::EnvironmentSnapshot;
use pathedit::services::LoggingProgress;
use pathedit::{
    APP_NAME, ConfigManager, ConflictEngine, DirectoryDiscovery, Partition, PathEditorState,
    PathEntry, PathStore, ScanEvent, Settings, VERSION,
};
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser, Debug)]
#[command(name = "pathedit", version, about = "Inspect and extend the executable search path")]
struct Cli {
    /// Directory holding settings, the path store and logs
    #[arg(long, default_value = ".pathedit")]
    config_dir: Utf8PathBuf,

    /// Use the process PATH instead of the path store
    #[arg(long, global = true)]
    from_env: bool,

    /// Log at debug level and echo logs to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report missing directories and shadowed executables
    Check,

    /// List executables on the path whose names start with a prefix
    Search { prefix: String },

    /// Find bin directories below a root
    Discover {
        root: Utf8PathBuf,

        /// Maximum depth below the root (defaults to the configured value)
        #[arg(long)]
        depth: Option<usize>,

        /// Append the found directories to the user path and save
        #[arg(long)]
        add: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let settings = config_manager.load_settings()?;
    let debug = cli.debug || settings.debug_mode;

    let _guard = pathedit::logging::setup_logging(
        &config_manager.config_dir().join("logs"),
        APP_NAME,
        debug,
        debug,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let state = PathEditorState::new();
    if cli.from_env {
        state.load(Partition::System, path_from_environment());
    } else {
        state.load_from(&config_manager.path_store(&settings))?;
    }

    match cli.command {
        Command::Check => run_check(&state, &settings),
        Command::Search { prefix } => run_search(&state, &settings, &prefix),
        Command::Discover { root, depth, add } => {
            let candidates = run_discover(&settings, root, depth);
            if add {
                if cli.from_env {
                    anyhow::bail!("--add needs the path store; drop --from-env");
                }
                add_candidates(&state, &config_manager.path_store(&settings), candidates)?;
            }
            Ok(())
        }
    }
}

fn path_from_environment() -> Vec<PathEntry> {
    let Some(raw) = std::env::var_os("PATH") else {
        tracing::warn!("PATH is not set");
        return Vec::new();
    };
    std::env::split_paths(&raw)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| PathEntry::new(dir.to_string_lossy()))
        .collect()
}

fn start_engine(settings: &Settings) -> Result<ConflictEngine> {
    ConflictEngine::with_options(&settings.extensions, settings.engine_options())
        .context("Failed to start conflict engine")
}

fn shutdown(mut engine: ConflictEngine) {
    engine.metrics().log_summary();
    engine.dispose();
}

fn run_check(state: &PathEditorState, settings: &Settings) -> Result<()> {
    let engine = start_engine(settings)?;
    let mut events = engine.subscribe();
    let generation = state.recheck(&engine)?;

    loop {
        match events.blocking_recv() {
            Ok(ScanEvent::Completed {
                generation: done, ..
            }) if done == generation => break,
            Ok(event) => tracing::debug!("Scan event: {:?}", event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Missed {} scan events", skipped);
            }
            Err(RecvError::Closed) => anyhow::bail!("Scan worker stopped before completing"),
        }
    }

    let mut flagged = 0;
    for set in state.combined() {
        let issues = set.issues();
        println!("[{:?}] {}", set.alert_level(), set.entry());
        for issue in &issues {
            println!("    {}", issue);
        }
        if !issues.is_empty() {
            flagged += 1;
        }
    }
    println!("{} of {} entries have issues", flagged, state.combined().len());

    shutdown(engine);
    Ok(())
}

fn run_search(state: &PathEditorState, settings: &Settings, prefix: &str) -> Result<()> {
    let engine = start_engine(settings)?;
    state.recheck(&engine)?;

    for found in engine.search(prefix)? {
        println!("{}", found.full_path());
    }

    shutdown(engine);
    Ok(())
}

fn run_discover(settings: &Settings, root: Utf8PathBuf, depth: Option<usize>) -> Vec<Utf8PathBuf> {
    let max_depth = depth.unwrap_or(settings.discovery.max_depth);
    let mut discovery =
        DirectoryDiscovery::new(root, max_depth).with_skip_dirs(&settings.discovery.skip_dirs);
    let progress = LoggingProgress::new();

    let candidates = discovery.run(&progress);
    for candidate in &candidates {
        println!("{}", candidate);
    }
    tracing::info!(
        "Visited {} directories, {} candidates",
        progress.visited(),
        candidates.len()
    );
    candidates
}

fn add_candidates(
    state: &PathEditorState,
    store: &dyn PathStore,
    candidates: Vec<Utf8PathBuf>,
) -> Result<()> {
    let environment = EnvironmentSnapshot::capture();
    let entries = candidates
        .iter()
        .map(|dir| PathEntry::from_file_path(dir, &environment))
        .collect();

    let added = state.add_entries(Partition::User, entries);
    for change in state.changes(Partition::User) {
        let marker = if change.is_added { '+' } else { '-' };
        println!("{} {}", marker, change.symbolic());
    }

    if added == 0 {
        println!("Nothing new to add");
        return Ok(());
    }

    state.save_to(store)?;
    println!("Added {} directories to the user path", added);
    Ok(())
}
