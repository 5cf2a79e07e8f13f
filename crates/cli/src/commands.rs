//! Cache maintenance operations behind each subcommand.
//!
//! All of them work on any [`CacheStore`], so they run against the same
//! database the server uses, or an in-memory store under test.

use tilegate_core::{CacheStore, Error, GenerationNames, Purpose};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationInfo {
    pub name: String,
    pub entries: u64,
    pub current: bool,
}

/// Entry counts for the current version's generations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub version: String,
    pub current: Vec<(String, u64)>,
    /// Generations left behind by other versions.
    pub stale_generations: usize,
    pub stale_entries: u64,
}

pub async fn generations(store: &dyn CacheStore, names: &GenerationNames) -> Result<Vec<GenerationInfo>, Error> {
    let mut out = Vec::new();
    for name in store.generation_names().await? {
        let entries = store.entry_count(&name).await?;
        let current = names.is_current(&name);
        out.push(GenerationInfo { name, entries, current });
    }
    Ok(out)
}

pub async fn stats(store: &dyn CacheStore, names: &GenerationNames) -> Result<Stats, Error> {
    let mut current = Vec::with_capacity(Purpose::ALL.len());
    for purpose in Purpose::ALL {
        let name = names.name(purpose);
        let count = store.entry_count(&name).await?;
        current.push((name, count));
    }

    let mut stale_generations = 0;
    let mut stale_entries = 0;
    for info in generations(store, names).await? {
        if !info.current {
            stale_generations += 1;
            stale_entries += info.entries;
        }
    }

    Ok(Stats { version: names.version().to_string(), current, stale_generations, stale_entries })
}

/// Returns true if there was a tile generation to delete.
pub async fn clear_tiles(store: &dyn CacheStore, names: &GenerationNames) -> Result<bool, Error> {
    store.delete_generation(&names.tile_name()).await
}

/// Delete (or with `dry_run`, just list) generations owned by other versions.
pub async fn prune(store: &dyn CacheStore, names: &GenerationNames, dry_run: bool) -> Result<Vec<String>, Error> {
    let mut pruned = Vec::new();
    for name in store.generation_names().await? {
        if names.is_current(&name) {
            continue;
        }
        if dry_run || store.delete_generation(&name).await? {
            pruned.push(name);
        }
    }
    Ok(pruned)
}
