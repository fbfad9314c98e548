//! `engine` — the minimal admin CLI (§6). The engine is library-first;
//! this binary wraps [`tagengine_api::Engine`] for the three ops that
//! don't belong inside an embedding application: `purge`,
//! `stats`, and `rebuild-index`.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use tagengine_api::{Config, Engine};

/// §6 exit code taxonomy, shared by every subcommand.
pub(crate) mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const INVALID_ARGS: u8 = 64;
    pub const NOT_FOUND: u8 = 65;
    pub const IO_ERROR: u8 = 70;
    pub const CORRUPT: u8 = 74;
}

#[derive(Parser)]
#[command(name = "engine", about = "Tag Filter Engine admin CLI", version)]
struct Cli {
    /// Root data directory. Falls back to `ENGINE_DATA_DIR` (§6).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove all durable and resident state for a workspace.
    Purge {
        #[arg(long)]
        workspace: String,
    },
    /// Print `introspect(Handle)` as JSON.
    Stats {
        #[arg(long)]
        workspace: String,
    },
    /// Reconstruct bitmaps from the catalog's notion of truth.
    RebuildIndex {
        #[arg(long)]
        workspace: String,
    },
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt::try_init();
    let cli = Cli::parse();

    let data_dir = cli
        .data_dir
        .or_else(|| std::env::var("ENGINE_DATA_DIR").ok().map(PathBuf::from));

    let Some(data_dir) = data_dir else {
        eprintln!("error: pass --data-dir or set ENGINE_DATA_DIR");
        return ExitCode::from(exit_code::INVALID_ARGS);
    };

    let engine = match Engine::open(Config::persistent(data_dir)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("error: failed to open engine: {e}");
            return ExitCode::from(exit_code::IO_ERROR);
        }
    };

    let result = match cli.command {
        Commands::Purge { workspace } => commands::purge(&engine, &workspace),
        Commands::Stats { workspace } => commands::stats(&engine, &workspace),
        Commands::RebuildIndex { workspace } => commands::rebuild_index(&engine, &workspace),
    };

    match result {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(code) => ExitCode::from(code),
    }
}
