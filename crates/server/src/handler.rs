//! MCP server handler implementation.
//!
//! Routes the gateway's two operations, install and fetch, to their tool
//! implementations.
use crate::tools::{
    gateway_fetch::{GatewayFetchParams, fetch_impl},
    gateway_install::install_impl,
};

use offgate_client::{Gateway, HttpTransport};
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

/// The main MCP server handler for offgate.
#[derive(Clone)]
pub struct OffgateServer {
    gateway: Gateway<HttpTransport>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl OffgateServer {
    /// Create a new server handler around an opened gateway.
    pub fn new(gateway: Gateway<HttpTransport>) -> Self {
        Self { gateway, tool_router: Self::tool_router() }
    }

    /// Install the current cache generation from the manifest, then evict
    /// stale generations.
    #[tool(
        description = "Fetch every manifest URL into the current cache generation. Fails as a whole if any URL cannot be fetched. On success, older generations are evicted."
    )]
    async fn gateway_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.gateway).await
    }

    /// Fetch a URL network-first with cache fallback on transport failure.
    #[tool(
        description = "Fetch a URL through the gateway. Network responses (any status) are returned as-is; if the network is unreachable, the cached copy from install time is returned."
    )]
    async fn gateway_fetch(&self, params: Parameters<GatewayFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.gateway, params.0).await
    }
}

impl ServerHandler for OffgateServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offgate".into(),
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
