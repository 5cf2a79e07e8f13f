//! Core types and request-interception logic for tilegate.
//!
//! This crate provides:
//! - Generational cache storage with SQLite and in-memory backends
//! - Request classification into tile, static, and passthrough traffic
//! - Tile and static asset cache policies
//! - Deployment lifecycle (install, activate, supersede) and control commands
//! - The [`Dispatcher`] tying them together
//! - Unified error types and layered configuration

pub mod cache;
pub mod classify;
pub mod clock;
pub mod config;
pub mod control;
pub mod dispatcher;
pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod policy;
pub mod request;

pub use cache::{CacheDb, CacheEntry, CacheStore, GenerationNames, MemoryStore, Purpose};
pub use classify::{Category, Classifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use control::{ControlCommand, ControlHandle, ControlMessage, ControlReply};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::Error;
pub use fetch::Fetcher;
pub use lifecycle::{LifecycleState, VersionNotice};
pub use request::{HttpResponse, InterceptedRequest, ServeSource, Served};
