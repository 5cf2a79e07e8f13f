//! The Cache Store seam.
//!
//! Every component reads and writes cache state through [`CacheStore`], so
//! the lifecycle and policy logic run unchanged against SQLite or the
//! in-memory fake.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Error;
use crate::request::HttpResponse;

/// One cached request/response pair.
///
/// Entries are never mutated in place; a refresh writes a new entry over
/// the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub request_key: String,
    pub url: String,
    pub response: HttpResponse,
    /// Persisted with millisecond precision.
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age relative to `now`, computed at read time.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.stored_at
    }

    /// Fresh while `now - stored_at < max_age`.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        self.age(now) < max_age
    }
}

/// Generational key-value storage for cached responses.
///
/// Generations are named buckets. Deleting a generation removes all of its
/// entries as one unit; readers never observe a partially deleted one.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the generation if it does not exist yet.
    async fn open_generation(&self, name: &str) -> Result<(), Error>;

    /// Names of every existing generation, sorted.
    async fn generation_names(&self) -> Result<Vec<String>, Error>;

    /// Delete a generation and all its entries. Returns false if it did not exist.
    async fn delete_generation(&self, name: &str) -> Result<bool, Error>;

    /// Look up an entry by request identity.
    async fn get(&self, generation: &str, request_key: &str) -> Result<Option<CacheEntry>, Error>;

    /// Store an entry, replacing any prior entry with the same identity.
    ///
    /// Creates the generation on first write.
    async fn put(&self, generation: &str, entry: &CacheEntry) -> Result<(), Error>;

    /// Number of entries in a generation; 0 if it does not exist.
    async fn entry_count(&self, generation: &str) -> Result<u64, Error>;
}
