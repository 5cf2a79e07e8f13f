//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the dispatcher.
use crate::tools::{ControlParams, InterceptParams, control_impl, intercept_impl, state_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use tilegate_core::{ControlHandle, Dispatcher};
use url::Url;

/// The main MCP server handler for tilegate.
#[derive(Clone)]
pub struct TilegateServer {
    tool_router: ToolRouter<Self>,
    dispatcher: Dispatcher,
    control: ControlHandle,
    origin: Url,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl TilegateServer {
    /// Create a new server handler around a running dispatcher and its control channel.
    pub fn new(dispatcher: Dispatcher, control: ControlHandle, origin: Url) -> Self {
        Self { tool_router: Self::tool_router(), dispatcher, control, origin }
    }

    /// Route a request through the offline cache.
    #[tool(
        description = "Intercept an outgoing request. Tile URLs use the tile cache, read-only app assets use the static cache, everything else goes to the network. Returns status, headers, base64 body and where the response came from."
    )]
    async fn intercept(&self, params: Parameters<InterceptParams>) -> Result<CallToolResult, McpError> {
        intercept_impl(&self.dispatcher, &self.origin, params.0).await
    }

    /// Send a control command.
    #[tool(
        description = "Send a control command: SKIP_WAITING, CLEAR_TILE_CACHE or GET_CACHE_SIZE. Returns the reply, or null for commands without one."
    )]
    async fn control(&self, params: Parameters<ControlParams>) -> Result<CallToolResult, McpError> {
        control_impl(&self.control, params.0).await
    }

    #[tool(description = "Report the lifecycle state, version and cache generation names of this deployment.")]
    async fn lifecycle_state(&self) -> Result<CallToolResult, McpError> {
        state_impl(&self.dispatcher).await
    }
}

impl ServerHandler for TilegateServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "tilegate".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::dispatcher;

    #[tokio::test]
    async fn test_lists_all_tools() {
        let (dispatcher, _) = dispatcher();
        let (control, _loop) = dispatcher.spawn_control_loop();
        let server = TilegateServer::new(dispatcher, control, Url::parse("http://localhost:8080").unwrap());

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, ["control", "intercept", "lifecycle_state"]);
    }

    #[test]
    fn test_server_info() {
        let (dispatcher, _) = dispatcher();
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let server = TilegateServer::new(dispatcher, ControlHandle::new(tx), Url::parse("http://localhost:8080").unwrap());
        assert_eq!(server.get_info().server_info.name, "tilegate");
    }
}
