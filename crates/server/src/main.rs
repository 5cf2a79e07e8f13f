//! tilegate server entry point.
//!
//! Boots the dispatcher for the configured version, installs it, and serves
//! the MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tilegate_client::{FetchClient, FetchConfig, canonicalize};
use tilegate_core::{AppConfig, CacheDb, Dispatcher};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.app_version, db = %config.db_path.display(), "Starting tilegate on stdio transport");

    let origin = canonicalize(&config.origin, None)?;
    let store = Arc::new(CacheDb::open(&config.db_path).await?);
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let dispatcher = Dispatcher::new(config.clone(), store, fetcher)?;

    spawn_lifecycle_log(&dispatcher);
    spawn_notice_listener(&dispatcher);
    let (control, _control_loop) = dispatcher.spawn_control_loop();

    let report = dispatcher.install().await?;
    if !report.failed.is_empty() {
        tracing::warn!(failed = report.failed.len(), "some bootstrap assets were not cached");
    }
    if config.auto_activate {
        dispatcher.activate().await?;
    } else {
        tracing::info!("waiting for SKIP_WAITING before activating");
    }

    let consumer = dispatcher.attach_consumer();
    let handler = handler::TilegateServer::new(dispatcher.clone(), control, origin);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;
    dispatcher.consumers().detach(consumer);

    Ok(())
}

fn spawn_lifecycle_log(dispatcher: &Dispatcher) {
    let mut transitions = dispatcher.lifecycle().watch();
    tokio::spawn(async move {
        while transitions.changed().await.is_ok() {
            let state = *transitions.borrow_and_update();
            tracing::info!(%state, "lifecycle transition");
        }
    });
}

fn spawn_notice_listener(dispatcher: &Dispatcher) {
    let mut notices = dispatcher.subscribe();
    let dispatcher = dispatcher.clone();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => dispatcher.handle_notice(&notice),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "version notices dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
