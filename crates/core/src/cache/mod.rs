//! Generational cache storage.
//!
//! A generation is a named bucket of cached responses for one purpose
//! (static assets or tiles) and one deployment version. This module
//! provides:
//!
//! - The [`CacheStore`] trait every component reads and writes through
//! - A SQLite backend with async access via tokio-rusqlite
//! - An in-memory backend for tests and ephemeral deployments
//! - Generation naming and request identity keys

pub mod connection;
pub mod entries;
pub mod generation;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use generation::{GenerationNames, Purpose};
pub use memory::MemoryStore;
pub use store::{CacheEntry, CacheStore};
