//! gateway_fetch tool implementation.
//!
//! Handles one request descriptor through the gateway.

use base64::{Engine as _, engine::general_purpose::STANDARD as Base64Standard};
use offgate_client::{FetchRequest, Gateway, ResponseSource, Transport};
use offgate_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single header.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeaderParam {
    pub name: String,
    pub value: String,
}

/// Parameters for the gateway_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewayFetchParams {
    /// Absolute or root-relative URL to fetch.
    pub url: String,

    /// HTTP method (default: GET). Only GET is ever answered from cache.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers forwarded to the network.
    #[serde(default)]
    pub headers: Vec<HeaderParam>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the gateway_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewayFetchOutput {
    /// "network" or "cache".
    pub source: String,
    /// Absolute URL the request resolved to.
    pub url: String,
    pub status: u16,
    pub headers: Vec<HeaderParam>,
    /// Response body, base64-encoded.
    pub body_base64: String,
    /// Response body as text, when it is valid UTF-8.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
}

/// Implementation of the gateway_fetch tool.
pub async fn fetch_impl<T: Transport + 'static>(
    gateway: &Gateway<T>, params: GatewayFetchParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let headers: Vec<(String, String)> = params.headers.into_iter().map(|h| (h.name, h.value)).collect();
    let request = FetchRequest::from_parts(&params.method, &params.url, &headers)?;

    let outcome = gateway.handle_fetch(&request).await?;
    let response = outcome.response;

    let output = GatewayFetchOutput {
        source: match outcome.source {
            ResponseSource::Network => "network".into(),
            ResponseSource::Cache => "cache".into(),
        },
        url: outcome.url.to_string(),
        status: response.status,
        headers: response
            .headers
            .into_iter()
            .map(|(name, value)| HeaderParam { name, value })
            .collect(),
        body_base64: Base64Standard.encode(&response.body),
        body_text: String::from_utf8(response.body).ok(),
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use offgate_client::{GatewaySettings, NetworkResponse, TransportError};
    use offgate_core::{CacheDb, GenerationId, Manifest};
    use reqwest::Url;
    use rmcp::model::ErrorData;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Serves `<path>` as the body of every URL while online.
    pub(crate) struct StaticSite {
        offline: AtomicBool,
    }

    impl StaticSite {
        pub(crate) fn online() -> Arc<Self> {
            Arc::new(Self { offline: AtomicBool::new(false) })
        }

        pub(crate) fn offline() -> Arc<Self> {
            Arc::new(Self { offline: AtomicBool::new(true) })
        }

        fn set_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl Transport for StaticSite {
        async fn send(&self, url: &Url, _request: &FetchRequest) -> Result<NetworkResponse, TransportError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(TransportError::Connect("network unreachable".into()));
            }
            let status = if url.path() == "/broken" { 503 } else { 200 };
            Ok(NetworkResponse {
                final_url: url.clone(),
                status: reqwest::StatusCode::from_u16(status).unwrap(),
                headers: reqwest::header::HeaderMap::new(),
                body: url.path().as_bytes().to_vec().into(),
                fetch_ms: 0,
            })
        }
    }

    pub(crate) async fn open_gateway_on(db: CacheDb, site: Arc<StaticSite>, generation: &str) -> Gateway<Arc<StaticSite>> {
        let settings = GatewaySettings {
            origin: Url::parse("https://app.example.com").unwrap(),
            manifest: Manifest::default(),
            generation: GenerationId::new(generation).unwrap(),
            install_concurrency: 2,
        };
        Gateway::open(db, site, settings).await.unwrap()
    }

    pub(crate) async fn open_gateway(site: Arc<StaticSite>, generation: &str) -> Gateway<Arc<StaticSite>> {
        open_gateway_on(CacheDb::open_in_memory().await.unwrap(), site, generation).await
    }

    fn params(url: &str) -> GatewayFetchParams {
        GatewayFetchParams { url: url.into(), method: default_method(), headers: Vec::new() }
    }

    fn parse_output(result: &CallToolResult) -> GatewayFetchOutput {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_from_network() {
        let gateway = open_gateway(StaticSite::online(), "gen").await;

        let output = parse_output(&fetch_impl(&gateway, params("/index.html")).await.unwrap());
        assert_eq!(output.source, "network");
        assert_eq!(output.url, "https://app.example.com/index.html");
        assert_eq!(output.status, 200);
        assert_eq!(output.body_text.as_deref(), Some("/index.html"));
        assert_eq!(Base64Standard.decode(output.body_base64).unwrap(), b"/index.html");
    }

    #[tokio::test]
    async fn test_fetch_http_error_passes_through() {
        let gateway = open_gateway(StaticSite::online(), "gen").await;

        let output = parse_output(&fetch_impl(&gateway, params("/broken")).await.unwrap());
        assert_eq!(output.source, "network");
        assert_eq!(output.status, 503);
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_cache() {
        let site = StaticSite::online();
        let gateway = open_gateway(Arc::clone(&site), "gen").await;
        gateway.install().await.unwrap();
        site.set_offline();

        let output = parse_output(&fetch_impl(&gateway, params("/manifest.json")).await.unwrap());
        assert_eq!(output.source, "cache");
        assert_eq!(output.body_text.as_deref(), Some("/manifest.json"));
    }

    #[tokio::test]
    async fn test_fetch_miss_is_mcp_error() {
        let gateway = open_gateway(StaticSite::offline(), "gen").await;

        let err: ErrorData = fetch_impl(&gateway, params("/index.html")).await.unwrap_err();
        assert_eq!(err.code.0, -32022);
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let gateway = open_gateway(StaticSite::online(), "gen").await;

        let result = fetch_impl(&gateway, params("  ")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_invalid_method() {
        let gateway = open_gateway(StaticSite::online(), "gen").await;
        let params = GatewayFetchParams { method: "NOT A METHOD".into(), ..params("/") };

        let err = fetch_impl(&gateway, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
