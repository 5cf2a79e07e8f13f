//! Out-of-band control commands.
//!
//! | command            | reply                                 |
//! |--------------------|---------------------------------------|
//! | `SKIP_WAITING`     | none                                  |
//! | `CLEAR_TILE_CACHE` | `{"success": true}`                   |
//! | `GET_CACHE_SIZE`   | `{"tileCount": n, "cacheName": "..."}` |
//!
//! Unrecognized command types are dropped without a reply.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::lifecycle::LifecycleManager;

/// A command sent by a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    SkipWaiting,
    ClearTileCache,
    GetCacheSize,
    #[serde(other)]
    Unknown,
}

impl ControlCommand {
    /// Decode a command message. Anything that is not a known command is `Unknown`.
    pub fn from_json(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or(ControlCommand::Unknown)
    }
}

/// Reply to a command that declares one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlReply {
    Cleared {
        success: bool,
    },
    #[serde(rename_all = "camelCase")]
    CacheSize {
        tile_count: u64,
        cache_name: String,
    },
}

/// A command plus where to send its reply, if anywhere.
#[derive(Debug)]
pub struct ControlMessage {
    pub command: ControlCommand,
    pub reply: Option<oneshot::Sender<ControlReply>>,
}

/// Execute a command against the lifecycle manager and its store.
///
/// Failures are logged; they never reach the sender as errors.
pub async fn execute(lifecycle: &LifecycleManager, command: ControlCommand) -> Option<ControlReply> {
    match command {
        ControlCommand::SkipWaiting => {
            if let Err(e) = lifecycle.skip_waiting().await {
                tracing::error!(error = %e, "skip waiting failed");
            }
            None
        }
        ControlCommand::ClearTileCache => {
            let name = lifecycle.names().tile_name();
            let success = match lifecycle.store().delete_generation(&name).await {
                Ok(existed) => {
                    tracing::info!(generation = %name, existed, "tile cache cleared");
                    true
                }
                Err(e) => {
                    tracing::error!(generation = %name, error = %e, "failed to clear tile cache");
                    false
                }
            };
            Some(ControlReply::Cleared { success })
        }
        ControlCommand::GetCacheSize => {
            let cache_name = lifecycle.names().tile_name();
            let tile_count = lifecycle.store().entry_count(&cache_name).await.unwrap_or_else(|e| {
                tracing::error!(generation = %cache_name, error = %e, "failed to count tile entries");
                0
            });
            Some(ControlReply::CacheSize { tile_count, cache_name })
        }
        ControlCommand::Unknown => {
            tracing::debug!("ignoring unrecognized control command");
            None
        }
    }
}

/// Sending half of the control channel.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlMessage>,
}

impl ControlHandle {
    pub fn new(tx: mpsc::Sender<ControlMessage>) -> Self {
        Self { tx }
    }

    /// Send a command without waiting for any reply.
    pub async fn post(&self, command: ControlCommand) -> bool {
        self.tx.send(ControlMessage { command, reply: None }).await.is_ok()
    }

    /// Send a command with a reply channel and wait for the reply.
    ///
    /// Returns `None` for commands that do not reply, or if the loop has stopped.
    pub async fn request(&self, command: ControlCommand) -> Option<ControlReply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ControlMessage { command, reply: Some(reply_tx) })
            .await
            .ok()?;
        reply_rx.await.ok()
    }
}
