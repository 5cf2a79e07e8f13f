//! Network side of tilegate.
//!
//! This crate provides the reqwest-backed [`Fetcher`](tilegate_core::Fetcher)
//! used by the server and URL canonicalization for consumer-supplied URLs.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, canonicalize};
