//! Deployment lifecycle: install, activate, supersede.
//!
//! ```text
//! Installing -> Waiting -> Active -> Superseded
//! ```
//!
//! Install pre-warms the static generation with the application shell.
//! Activation deletes every generation that does not belong to the running
//! version, notifies live consumers, and claims them for this deployment.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use url::Url;

use crate::Error;
use crate::cache::{CacheEntry, CacheStore, GenerationNames};
use crate::clock::Clock;
use crate::fetch::Fetcher;
use crate::request::InterceptedRequest;

/// Capacity of the version-update broadcast channel.
pub const NOTICE_CAPACITY: usize = 16;

/// Lifecycle state of one deployment instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Installing,
    Waiting,
    Active,
    Superseded,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Installing => "installing",
            LifecycleState::Waiting => "waiting",
            LifecycleState::Active => "active",
            LifecycleState::Superseded => "superseded",
        };
        f.write_str(s)
    }
}

/// Broadcast to every live consumer when a version activates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "VERSION_UPDATED")]
pub struct VersionNotice {
    pub version: String,
}

/// Identifies an attached consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

/// Consumers attached to the process and the deployment version controlling each.
///
/// A consumer with no controller was attached before any deployment activated.
#[derive(Debug, Default)]
pub struct ConsumerRegistry {
    controllers: Mutex<HashMap<ConsumerId, Option<String>>>,
    next_id: AtomicU64,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a consumer, optionally already controlled by a version.
    pub fn attach(&self, controller: Option<String>) -> ConsumerId {
        let id = ConsumerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, controller);
        id
    }

    pub fn detach(&self, id: ConsumerId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn controller(&self, id: ConsumerId) -> Option<String> {
        self.lock().get(&id).cloned().flatten()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make `version` the controller of every consumer. Returns how many changed hands.
    pub fn claim(&self, version: &str) -> usize {
        let mut controllers = self.lock();
        let mut claimed = 0;
        for controller in controllers.values_mut() {
            if controller.as_deref() != Some(version) {
                *controller = Some(version.to_string());
                claimed += 1;
            }
        }
        claimed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ConsumerId, Option<String>>> {
        self.controllers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Outcome of the install step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Bootstrap URLs written to the static generation.
    pub cached: Vec<String>,
    /// Bootstrap URLs that could not be pre-warmed, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Outcome of the activate step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    pub notified: usize,
    pub claimed: usize,
}

/// Owns generation naming, pre-warm, cleanup, and the lifecycle state.
pub struct LifecycleManager {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    names: GenerationNames,
    bootstrap: Vec<Url>,
    state: watch::Sender<LifecycleState>,
    notices: broadcast::Sender<VersionNotice>,
    consumers: Arc<ConsumerRegistry>,
    skip_waiting: AtomicBool,
    activation: tokio::sync::Mutex<()>,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>, clock: Arc<dyn Clock>, names: GenerationNames,
        bootstrap: Vec<Url>, notices: broadcast::Sender<VersionNotice>, consumers: Arc<ConsumerRegistry>,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Installing);
        Self {
            store,
            fetcher,
            clock,
            names,
            bootstrap,
            state,
            notices,
            consumers,
            skip_waiting: AtomicBool::new(false),
            activation: tokio::sync::Mutex::new(()),
        }
    }

    pub fn names(&self) -> &GenerationNames {
        &self.names
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn consumers(&self) -> &Arc<ConsumerRegistry> {
        &self.consumers
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn watch(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VersionNotice> {
        self.notices.subscribe()
    }

    /// Open the static generation and pre-warm it with the bootstrap assets.
    ///
    /// Individual asset failures are logged and reported, never fatal. Moves
    /// to `Waiting`, or straight on to `Active` if skip-waiting was requested
    /// meanwhile.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.expect_state(LifecycleState::Installing, "install")?;

        let generation = self.names.static_name();
        self.store.open_generation(&generation).await?;

        let mut report = InstallReport::default();
        for url in &self.bootstrap {
            match self.prewarm(&generation, url).await {
                Ok(()) => report.cached.push(url.to_string()),
                Err(reason) => {
                    tracing::warn!(url = %url, %reason, "failed to pre-warm bootstrap asset");
                    report.failed.push((url.to_string(), reason));
                }
            }
        }

        self.state.send_replace(LifecycleState::Waiting);
        tracing::info!(
            version = self.names.version(),
            cached = report.cached.len(),
            failed = report.failed.len(),
            "install complete, waiting"
        );

        if self.skip_waiting.load(Ordering::Acquire) {
            self.activate().await?;
        }

        Ok(report)
    }

    async fn prewarm(&self, generation: &str, url: &Url) -> Result<(), String> {
        let request = InterceptedRequest::new("GET", url.clone()).map_err(|e| e.to_string())?;
        let response = self.fetcher.fetch(&request).await.map_err(|e| e.to_string())?;
        if !response.is_cacheable() {
            return Err(format!("status {}", response.status));
        }

        let entry = CacheEntry {
            request_key: request.cache_key(),
            url: request.url().to_string(),
            response,
            stored_at: self.clock.now(),
        };
        self.store.put(generation, &entry).await.map_err(|e| e.to_string())
    }

    /// Purge superseded generations, notify consumers, claim them, and become `Active`.
    ///
    /// A no-op when already active.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let _guard = self.activation.lock().await;

        match self.state() {
            LifecycleState::Active => return Ok(ActivationReport::default()),
            LifecycleState::Waiting => {}
            other => return Err(Error::Lifecycle(format!("cannot activate from {other}"))),
        }

        let (deleted, notified) = tokio::join!(self.delete_superseded(), async { self.notify() });
        let deleted = deleted?;

        let claimed = self.consumers.claim(self.names.version());
        self.state.send_replace(LifecycleState::Active);

        tracing::info!(
            version = self.names.version(),
            deleted = deleted.len(),
            notified,
            claimed,
            "activated"
        );

        Ok(ActivationReport { deleted, notified, claimed })
    }

    async fn delete_superseded(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.store.generation_names().await? {
            if self.names.is_current(&name) {
                continue;
            }
            if self.store.delete_generation(&name).await? {
                tracing::debug!(generation = %name, "deleted superseded generation");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    fn notify(&self) -> usize {
        let notice = VersionNotice { version: self.names.version().to_string() };
        // No receivers is not an error; there is simply nobody to tell.
        self.notices.send(notice).unwrap_or(0)
    }

    /// Force `Waiting -> Active` without waiting for the driver.
    ///
    /// Requested during install, activation happens as soon as install finishes.
    pub async fn skip_waiting(&self) -> Result<(), Error> {
        self.skip_waiting.store(true, Ordering::Release);
        match self.state() {
            LifecycleState::Waiting => self.activate().await.map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Another version took over. Returns true if this call changed the state.
    pub fn supersede(&self) -> bool {
        self.state.send_if_modified(|state| match state {
            LifecycleState::Waiting | LifecycleState::Active => {
                *state = LifecycleState::Superseded;
                true
            }
            _ => false,
        })
    }

    fn expect_state(&self, expected: LifecycleState, op: &str) -> Result<(), Error> {
        let current = self.state();
        if current == expected {
            Ok(())
        } else {
            Err(Error::Lifecycle(format!("cannot {op} from {current}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::clock::SystemClock;
    use crate::request::HttpResponse;
    use async_trait::async_trait;

    /// Serves 200 for every URL except those containing "missing".
    struct ShellFetcher;

    #[async_trait]
    impl Fetcher for ShellFetcher {
        async fn fetch(&self, request: &InterceptedRequest) -> Result<HttpResponse, Error> {
            if request.url().path().contains("missing") {
                return Err(Error::Network("connection refused".into()));
            }
            Ok(HttpResponse::new(200, Vec::new(), request.url().path().to_string()))
        }
    }

    fn manager(store: Arc<MemoryStore>, version: &str, paths: &[&str]) -> LifecycleManager {
        let origin = Url::parse("http://localhost:8080").unwrap();
        let bootstrap = paths.iter().map(|p| origin.join(p).unwrap()).collect();
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        LifecycleManager::new(
            store,
            Arc::new(ShellFetcher),
            Arc::new(SystemClock),
            GenerationNames::new("tilegate", version),
            bootstrap,
            notices,
            Arc::new(ConsumerRegistry::new()),
        )
    }

    #[tokio::test]
    async fn test_install_prewarms_shell() {
        let store = Arc::new(MemoryStore::new());
        let lm = manager(store.clone(), "2", &["/", "/index.html"]);

        let report = lm.install().await.unwrap();

        assert_eq!(report.cached.len(), 2);
        assert!(report.failed.is_empty());
        assert_eq!(lm.state(), LifecycleState::Waiting);
        assert_eq!(store.entry_count("tilegate-static-2").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_install_failure_is_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        let lm = manager(store.clone(), "2", &["/index.html", "/missing.js"]);

        let report = lm.install().await.unwrap();

        assert_eq!(report.cached, vec!["http://localhost:8080/index.html".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(lm.state(), LifecycleState::Waiting);
    }

    #[tokio::test]
    async fn test_install_twice_rejected() {
        let lm = manager(Arc::new(MemoryStore::new()), "2", &[]);
        lm.install().await.unwrap();
        assert!(matches!(lm.install().await, Err(Error::Lifecycle(_))));
    }

    #[tokio::test]
    async fn test_activate_deletes_superseded_generations() {
        let store = Arc::new(MemoryStore::new());
        for name in ["tilegate-static-1", "tilegate-tile-1", "tilegate-tile-2", "unrelated"] {
            store.open_generation(name).await.unwrap();
        }
        let lm = manager(store.clone(), "2", &["/"]);
        lm.install().await.unwrap();

        let report = lm.activate().await.unwrap();

        assert_eq!(lm.state(), LifecycleState::Active);
        assert_eq!(report.deleted.len(), 3);
        assert_eq!(
            store.generation_names().await.unwrap(),
            vec!["tilegate-static-2".to_string(), "tilegate-tile-2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_activate_before_install_rejected() {
        let lm = manager(Arc::new(MemoryStore::new()), "2", &[]);
        assert!(matches!(lm.activate().await, Err(Error::Lifecycle(_))));
    }

    #[tokio::test]
    async fn test_activate_notifies_and_claims() {
        let lm = manager(Arc::new(MemoryStore::new()), "2", &[]);
        let mut rx = lm.subscribe();
        let old = lm.consumers().attach(Some("1".into()));
        let fresh = lm.consumers().attach(None);
        lm.install().await.unwrap();

        let report = lm.activate().await.unwrap();

        assert_eq!(report.notified, 1);
        assert_eq!(report.claimed, 2);
        assert_eq!(rx.recv().await.unwrap(), VersionNotice { version: "2".into() });
        assert_eq!(lm.consumers().controller(old).as_deref(), Some("2"));
        assert_eq!(lm.consumers().controller(fresh).as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_activate_is_idempotent() {
        let lm = manager(Arc::new(MemoryStore::new()), "2", &[]);
        lm.install().await.unwrap();
        lm.activate().await.unwrap();
        assert_eq!(lm.activate().await.unwrap(), ActivationReport::default());
    }

    #[tokio::test]
    async fn test_skip_waiting_during_install() {
        let lm = manager(Arc::new(MemoryStore::new()), "2", &[]);
        lm.skip_waiting().await.unwrap();
        assert_eq!(lm.state(), LifecycleState::Installing);

        lm.install().await.unwrap();
        assert_eq!(lm.state(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_skip_waiting_while_waiting() {
        let lm = manager(Arc::new(MemoryStore::new()), "2", &[]);
        lm.install().await.unwrap();
        lm.skip_waiting().await.unwrap();
        assert_eq!(lm.state(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_supersede() {
        let lm = manager(Arc::new(MemoryStore::new()), "2", &[]);
        assert!(!lm.supersede());
        lm.install().await.unwrap();
        lm.activate().await.unwrap();
        assert!(lm.supersede());
        assert_eq!(lm.state(), LifecycleState::Superseded);
        assert!(!lm.supersede());
    }

    #[test]
    fn test_notice_wire_format() {
        let json = serde_json::to_value(VersionNotice { version: "2".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "VERSION_UPDATED", "version": "2"}));
    }

    #[test]
    fn test_registry_detach() {
        let registry = ConsumerRegistry::new();
        let id = registry.attach(None);
        assert_eq!(registry.len(), 1);
        assert!(registry.detach(id));
        assert!(registry.is_empty());
        assert!(!registry.detach(id));
    }
}
