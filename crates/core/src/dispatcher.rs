//! The per-process dispatcher.
//!
//! Owns the classifier, both policy engines and the lifecycle manager, and
//! is the only entry point for requests, control commands, and lifecycle
//! events. Cloning is cheap; all clones share one deployment instance.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use url::Url;

use crate::Error;
use crate::cache::{CacheStore, GenerationNames};
use crate::classify::{Category, Classifier};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::control::{self, ControlCommand, ControlHandle, ControlMessage, ControlReply};
use crate::fetch::Fetcher;
use crate::lifecycle::{
    ActivationReport, ConsumerId, ConsumerRegistry, InstallReport, LifecycleManager, LifecycleState, NOTICE_CAPACITY,
    VersionNotice,
};
use crate::policy::{StaticPolicy, TilePolicy};
use crate::request::{InterceptedRequest, ServeSource, Served};

/// Depth of the control command queue.
const CONTROL_QUEUE: usize = 32;

struct Inner {
    classifier: Classifier,
    tiles: TilePolicy,
    statics: StaticPolicy,
    fetcher: Arc<dyn Fetcher>,
    lifecycle: LifecycleManager,
}

/// Routes requests and commands for one deployment version.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    config: AppConfig,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    notices: Option<broadcast::Sender<VersionNotice>>,
    consumers: Option<Arc<ConsumerRegistry>>,
}

impl DispatcherBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a notice channel with other deployment instances.
    pub fn notices(mut self, notices: broadcast::Sender<VersionNotice>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Share a consumer registry with other deployment instances.
    pub fn consumers(mut self, consumers: Arc<ConsumerRegistry>) -> Self {
        self.consumers = Some(consumers);
        self
    }

    pub fn build(self) -> Result<Dispatcher, Error> {
        let config = self.config;
        let classifier = Classifier::from_config(&config)?;
        let names = GenerationNames::new(config.cache_prefix.clone(), config.app_version.clone());

        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        let bootstrap = config
            .bootstrap_paths
            .iter()
            .map(|path| {
                origin
                    .join(path)
                    .map_err(|e| Error::InvalidUrl(format!("bootstrap path {path}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let tiles = TilePolicy::new(
            self.store.clone(),
            self.fetcher.clone(),
            self.clock.clone(),
            names.tile_name(),
            config.max_tile_age(),
        );
        let statics = StaticPolicy::new(self.store.clone(), self.fetcher.clone(), self.clock.clone(), names.static_name());

        let notices = self.notices.unwrap_or_else(|| broadcast::channel(NOTICE_CAPACITY).0);
        let consumers = self.consumers.unwrap_or_default();
        let lifecycle =
            LifecycleManager::new(self.store, self.fetcher.clone(), self.clock, names, bootstrap, notices, consumers);

        Ok(Dispatcher { inner: Arc::new(Inner { classifier, tiles, statics, fetcher: self.fetcher, lifecycle }) })
    }
}

impl Dispatcher {
    pub fn builder(config: AppConfig, store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>) -> DispatcherBuilder {
        DispatcherBuilder { config, store, fetcher, clock: Arc::new(SystemClock), notices: None, consumers: None }
    }

    pub fn new(config: AppConfig, store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        Self::builder(config, store, fetcher).build()
    }

    pub fn names(&self) -> &GenerationNames {
        self.inner.lifecycle.names()
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lifecycle.state()
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.inner.lifecycle
    }

    pub fn consumers(&self) -> &Arc<ConsumerRegistry> {
        self.inner.lifecycle.consumers()
    }

    /// Attach a consumer. Once this version is active it controls new consumers directly.
    pub fn attach_consumer(&self) -> ConsumerId {
        let controller = (self.state() == LifecycleState::Active).then(|| self.names().version().to_string());
        self.consumers().attach(controller)
    }

    /// Receive version-update notices.
    pub fn subscribe(&self) -> broadcast::Receiver<VersionNotice> {
        self.inner.lifecycle.subscribe()
    }

    pub fn classify(&self, request: &InterceptedRequest) -> Category {
        self.inner.classifier.classify(request)
    }

    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.inner.lifecycle.install().await
    }

    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.inner.lifecycle.activate().await
    }

    /// Handle one intercepted request.
    ///
    /// Errors only for tile and passthrough requests whose network fetch
    /// failed with nothing cached to fall back on.
    pub async fn handle_request(&self, request: &InterceptedRequest) -> Result<Served, Error> {
        if self.state() == LifecycleState::Superseded {
            return self.passthrough(request).await;
        }

        let category = self.classify(request);
        tracing::debug!(method = request.method(), url = %request.url(), ?category, "dispatching request");

        match category {
            Category::Tile => self.inner.tiles.handle(request).await,
            Category::StaticCacheable => Ok(self.inner.statics.handle(request).await),
            Category::Passthrough => self.passthrough(request).await,
        }
    }

    async fn passthrough(&self, request: &InterceptedRequest) -> Result<Served, Error> {
        let response = self.inner.fetcher.fetch(request).await?;
        Ok(Served::new(response, ServeSource::Passthrough))
    }

    /// Execute a control command, returning its reply if it has one.
    pub async fn handle_command(&self, command: ControlCommand) -> Option<ControlReply> {
        control::execute(&self.inner.lifecycle, command).await
    }

    /// Execute a control message and deliver the reply to its channel.
    pub async fn handle_message(&self, message: ControlMessage) {
        let reply = self.handle_command(message.command).await;
        if let (Some(reply), Some(tx)) = (reply, message.reply) {
            // The sender may have gone away; nothing to do then.
            let _ = tx.send(reply);
        }
    }

    /// Service control messages on a background task, one task per message.
    pub fn spawn_control_loop(&self) -> (ControlHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<ControlMessage>(CONTROL_QUEUE);
        let dispatcher = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.handle_message(message).await });
            }
            tracing::debug!("control channel closed");
        });
        (ControlHandle::new(tx), handle)
    }

    /// React to a version notice from another deployment instance.
    pub fn handle_notice(&self, notice: &VersionNotice) {
        if notice.version != self.names().version() && self.inner.lifecycle.supersede() {
            tracing::info!(
                version = self.names().version(),
                successor = %notice.version,
                "superseded by newer deployment"
            );
        }
    }
}
