//! Tile cache policy.
//!
//! 1. Fresh entry (`age < max_age`): served from cache, no network call.
//! 2. Otherwise fetch. A 200 is stored with `stored_at = now` and returned.
//! 3. Fetch failed or came back non-200: serve the prior entry if one
//!    exists, whatever its age. Without one, a transport error propagates
//!    unchanged and a non-200 response is handed back as received.

use std::sync::Arc;

use super::{lookup, store_response};
use crate::Error;
use crate::cache::CacheStore;
use crate::clock::Clock;
use crate::fetch::Fetcher;
use crate::request::{InterceptedRequest, ServeSource, Served};

pub struct TilePolicy {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    generation: String,
    max_age: chrono::Duration,
}

impl TilePolicy {
    pub fn new(
        store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>, clock: Arc<dyn Clock>, generation: String,
        max_age: chrono::Duration,
    ) -> Self {
        Self { store, fetcher, clock, generation, max_age }
    }

    pub async fn handle(&self, request: &InterceptedRequest) -> Result<Served, Error> {
        let cached = lookup(self.store.as_ref(), &self.generation, request).await;

        if let Some(entry) = &cached
            && entry.is_fresh(self.clock.now(), self.max_age)
        {
            tracing::debug!(url = %request.url(), "tile cache hit");
            return Ok(Served::new(entry.response.clone(), ServeSource::Cache));
        }

        match self.fetcher.fetch(request).await {
            Ok(response) if response.is_cacheable() => {
                store_response(self.store.as_ref(), &self.generation, request, &response, self.clock.now()).await;
                tracing::debug!(url = %request.url(), revalidated = cached.is_some(), "tile fetched and stored");
                Ok(Served::new(response, ServeSource::Network))
            }
            Ok(response) => match cached {
                Some(entry) => {
                    tracing::warn!(url = %request.url(), status = response.status, "tile upstream rejected, serving stale");
                    Ok(Served::new(entry.response, ServeSource::Stale))
                }
                None => Ok(Served::new(response, ServeSource::Network)),
            },
            Err(e) => match cached {
                Some(entry) => {
                    tracing::warn!(url = %request.url(), error = %e, "tile fetch failed, serving stale");
                    Ok(Served::new(entry.response, ServeSource::Stale))
                }
                None => Err(e),
            },
        }
    }
}
