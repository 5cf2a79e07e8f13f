//! control tool implementation.
//!
//! Posts a command onto the dispatcher's control channel and returns the
//! reply, or `null` for commands that do not reply.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tilegate_core::{ControlCommand, ControlHandle};

use super::json_result;

/// Input parameters for the control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControlParams {
    /// Command type: `SKIP_WAITING`, `CLEAR_TILE_CACHE` or `GET_CACHE_SIZE`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Implementation of the control tool.
pub async fn control_impl(handle: &ControlHandle, params: ControlParams) -> Result<CallToolResult, McpError> {
    let command = ControlCommand::from_json(serde_json::json!({ "type": params.kind }));
    tracing::debug!(?command, "control command received");

    let reply = handle.request(command).await;
    Ok(json_result(&reply)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::intercept::{InterceptParams, intercept_impl};
    use crate::tools::testing::{dispatcher, text};
    use serde_json::{Value, json};
    use tilegate_core::LifecycleState;

    async fn control(handle: &ControlHandle, kind: &str) -> Value {
        let result = control_impl(handle, ControlParams { kind: kind.into() }).await.unwrap();
        serde_json::from_str(&text(&result)).unwrap()
    }

    #[tokio::test]
    async fn test_get_cache_size_counts_tiles() {
        let (dispatcher, _) = dispatcher();
        let (handle, _loop) = dispatcher.spawn_control_loop();
        let origin = url::Url::parse("http://localhost:8080").unwrap();

        for n in 0..3 {
            let params =
                InterceptParams { url: format!("https://api.mapbox.com/v4/x/1/1/{n}.png"), method: "GET".into() };
            intercept_impl(&dispatcher, &origin, params).await.unwrap();
        }

        let reply = control(&handle, "GET_CACHE_SIZE").await;
        assert_eq!(reply, json!({"tileCount": 3, "cacheName": "tilegate-tile-1.2.3"}));
    }

    #[tokio::test]
    async fn test_clear_tile_cache() {
        let (dispatcher, _) = dispatcher();
        let (handle, _loop) = dispatcher.spawn_control_loop();

        assert_eq!(control(&handle, "CLEAR_TILE_CACHE").await, json!({"success": true}));
        assert_eq!(control(&handle, "GET_CACHE_SIZE").await["tileCount"], json!(0));
    }

    #[tokio::test]
    async fn test_skip_waiting_has_no_reply() {
        let (dispatcher, _) = dispatcher();
        let (handle, _loop) = dispatcher.spawn_control_loop();
        dispatcher.install().await.unwrap();

        assert_eq!(control(&handle, "SKIP_WAITING").await, Value::Null);
        assert_eq!(dispatcher.state(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_unknown_command_ignored() {
        let (dispatcher, _) = dispatcher();
        let (handle, _loop) = dispatcher.spawn_control_loop();

        assert_eq!(control(&handle, "get_cache_size").await, Value::Null);
        assert_eq!(control(&handle, "REBOOT").await, Value::Null);
        assert_eq!(dispatcher.state(), LifecycleState::Installing);
    }
}
