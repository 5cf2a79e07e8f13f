//! MCP tool implementations.
//!
//! This module contains all tools exposed by the tilegate server.

pub mod control;
pub mod intercept;
pub mod state;

pub use control::{ControlParams, control_impl};
pub use intercept::{InterceptOutput, InterceptParams, intercept_impl};
pub use state::{StateOutput, state_impl};

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use tilegate_core::Error;

/// Wrap a serializable tool output as pretty JSON text content.
fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, Error> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
