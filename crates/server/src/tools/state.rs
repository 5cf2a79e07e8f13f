//! lifecycle_state tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tilegate_core::{Dispatcher, LifecycleState};

use super::json_result;

/// Output structure for the lifecycle_state tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StateOutput {
    pub state: LifecycleState,
    pub version: String,
    /// Name of the static asset generation owned by this version.
    pub static_cache: String,
    /// Name of the tile generation owned by this version.
    pub tile_cache: String,
    /// Number of consumers currently attached.
    pub consumers: usize,
}

pub async fn state_impl(dispatcher: &Dispatcher) -> Result<CallToolResult, McpError> {
    let names = dispatcher.names();
    let output = StateOutput {
        state: dispatcher.state(),
        version: names.version().to_string(),
        static_cache: names.static_name(),
        tile_cache: names.tile_name(),
        consumers: dispatcher.consumers().len(),
    };
    Ok(json_result(&output)?)
}
