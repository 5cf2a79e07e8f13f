//! Static asset policy: cache-first, no TTL.

use std::sync::Arc;

use super::{lookup, store_response};
use crate::cache::CacheStore;
use crate::clock::Clock;
use crate::fetch::Fetcher;
use crate::request::{HttpResponse, InterceptedRequest, ServeSource, Served};

pub struct StaticPolicy {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    generation: String,
}

impl StaticPolicy {
    pub fn new(store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>, clock: Arc<dyn Clock>, generation: String) -> Self {
        Self { store, fetcher, clock, generation }
    }

    /// Never fails: an unreachable, uncached asset yields [`HttpResponse::offline`].
    pub async fn handle(&self, request: &InterceptedRequest) -> Served {
        if let Some(entry) = lookup(self.store.as_ref(), &self.generation, request).await {
            return Served::new(entry.response, ServeSource::Cache);
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    store_response(self.store.as_ref(), &self.generation, request, &response, self.clock.now()).await;
                }
                Served::new(response, ServeSource::Network)
            }
            Err(e) => {
                tracing::warn!(url = %request.url(), error = %e, "static fetch failed, serving offline response");
                Served::new(HttpResponse::offline(), ServeSource::Offline)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::cache::{CacheEntry, MemoryStore};
    use crate::clock::SystemClock;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed outcome and counts calls.
    struct FixedFetcher {
        status: Option<u16>,
        calls: AtomicUsize,
    }

    impl FixedFetcher {
        fn ok(status: u16) -> Self {
            Self { status: Some(status), calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { status: None, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Fetcher for FixedFetcher {
        async fn fetch(&self, _request: &InterceptedRequest) -> Result<HttpResponse, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.status {
                Some(status) => Ok(HttpResponse::new(status, Vec::new(), "<html></html>")),
                None => Err(Error::Network("offline".into())),
            }
        }
    }

    fn policy(store: &Arc<MemoryStore>, fetcher: &Arc<FixedFetcher>) -> StaticPolicy {
        StaticPolicy::new(store.clone(), fetcher.clone(), Arc::new(SystemClock), "tilegate-static-1".into())
    }

    fn index() -> InterceptedRequest {
        InterceptedRequest::get("http://localhost:8080/index.html").unwrap()
    }

    #[tokio::test]
    async fn test_miss_populates() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(FixedFetcher::ok(200));
        let policy = policy(&store, &fetcher);

        let first = policy.handle(&index()).await;
        let second = policy.handle(&index()).await;

        assert_eq!(first.source, ServeSource::Network);
        assert_eq!(second.source, ServeSource::Cache);
        assert_eq!(first.response, second.response);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hit_ignores_age() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(FixedFetcher::failing());
        let request = index();
        let entry = CacheEntry {
            request_key: request.cache_key(),
            url: request.url().to_string(),
            response: HttpResponse::new(200, Vec::new(), "ancient"),
            stored_at: chrono::Utc::now() - chrono::Duration::days(365),
        };
        store.put("tilegate-static-1", &entry).await.unwrap();

        let served = policy(&store, &fetcher).handle(&request).await;

        assert_eq!(served.source, ServeSource::Cache);
        assert_eq!(served.response.body, "ancient");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_serves_offline() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(FixedFetcher::failing());

        let served = policy(&store, &fetcher).handle(&index()).await;

        assert_eq!(served.source, ServeSource::Offline);
        assert_eq!(served.response.status, 503);
        assert_eq!(served.response.body, "Offline");
    }

    #[tokio::test]
    async fn test_non_200_not_stored() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(FixedFetcher::ok(404));

        let served = policy(&store, &fetcher).handle(&index()).await;

        assert_eq!(served.response.status, 404);
        assert_eq!(store.entry_count("tilegate-static-1").await.unwrap(), 0);
    }
}
