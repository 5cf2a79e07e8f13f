//! tilegate-cli: offline cache maintenance.
//!
//! Reads the same configuration as the server and operates directly on its
//! SQLite cache database.

mod args;
mod commands;

use anyhow::Result;
use clap::Parser;
use tilegate_core::{AppConfig, CacheDb, GenerationNames};
use tracing_subscriber::EnvFilter;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    let version = cli.as_version.unwrap_or_else(|| config.app_version.clone());
    let names = GenerationNames::new(config.cache_prefix.clone(), version);

    tracing::debug!(db = %config.db_path.display(), version = names.version(), "opening cache");
    let store = CacheDb::open(&config.db_path).await?;

    match cli.command {
        Commands::Generations => {
            for info in commands::generations(&store, &names).await? {
                let marker = if info.current { "*" } else { " " };
                println!("{marker} {:<40} {:>8}", info.name, info.entries);
            }
        }
        Commands::Stats => {
            let stats = commands::stats(&store, &names).await?;
            println!("version: {}", stats.version);
            for (name, count) in &stats.current {
                println!("  {name:<40} {count:>8}");
            }
            println!(
                "stale: {} generation(s), {} entries",
                stats.stale_generations, stats.stale_entries
            );
        }
        Commands::ClearTiles => {
            let existed = commands::clear_tiles(&store, &names).await?;
            if existed {
                println!("cleared {}", names.tile_name());
            } else {
                println!("{} does not exist", names.tile_name());
            }
        }
        Commands::Prune { dry_run } => {
            let pruned = commands::prune(&store, &names, dry_run).await?;
            let verb = if dry_run { "would delete" } else { "deleted" };
            for name in &pruned {
                println!("{verb} {name}");
            }
            if pruned.is_empty() {
                println!("nothing to prune");
            }
        }
    }

    Ok(())
}
