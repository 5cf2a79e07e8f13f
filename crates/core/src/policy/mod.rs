//! Response policies for classified requests.
//!
//! - [`TilePolicy`]: TTL-bounded freshness, network revalidation, stale-on-failure
//! - [`StaticPolicy`]: cache-first with population on miss, fixed offline fallback
//!
//! Neither takes a lock around an entry. Concurrent misses for one identity
//! each fetch independently and the last completed write wins.

pub mod static_assets;
pub mod tile;

pub use static_assets::StaticPolicy;
pub use tile::TilePolicy;

use crate::cache::{CacheEntry, CacheStore};
use crate::request::{HttpResponse, InterceptedRequest};

/// Read an entry, treating store failures as a miss.
pub(crate) async fn lookup(store: &dyn CacheStore, generation: &str, request: &InterceptedRequest) -> Option<CacheEntry> {
    match store.get(generation, &request.cache_key()).await {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!(generation, url = %request.url(), error = %e, "cache read failed, treating as miss");
            None
        }
    }
}

/// Write a fresh entry. A failed write is logged and does not fail the request.
pub(crate) async fn store_response(
    store: &dyn CacheStore, generation: &str, request: &InterceptedRequest, response: &HttpResponse,
    stored_at: chrono::DateTime<chrono::Utc>,
) {
    let entry = CacheEntry {
        request_key: request.cache_key(),
        url: request.url().to_string(),
        response: response.clone(),
        stored_at,
    };
    if let Err(e) = store.put(generation, &entry).await {
        tracing::warn!(generation, url = %request.url(), error = %e, "cache write failed");
    }
}
