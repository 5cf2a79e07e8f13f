//! Command-line surface for `tilegate-cli`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tilegate-cli", version, about = "Inspect and maintain the tilegate offline cache", long_about = None)]
pub struct Cli {
    /// SQLite cache database (overrides the configured db_path)
    #[arg(long, env = "TILEGATE_DB_PATH")]
    pub db: Option<PathBuf>,

    /// Treat this version as current instead of the configured app_version
    #[arg(long = "as-version")]
    pub as_version: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every cache generation with its entry count
    Generations,
    /// Summarize the current version's caches
    Stats,
    /// Delete the current version's tile generation
    ClearTiles,
    /// Delete every generation not owned by the current version
    Prune {
        /// Only list what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}
