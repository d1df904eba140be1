//! gateway_install tool implementation.
//!
//! Installs the current generation, then runs the explicit eviction step.

use offgate_client::{Gateway, Transport};
use offgate_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output from the gateway_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewayInstallOutput {
    /// Id of the generation now serving fallbacks.
    pub generation: String,
    /// Number of manifest URLs stored.
    pub entries: usize,
    /// True if the generation was already installed.
    pub reused: bool,
    /// Number of stale generations deleted.
    pub evicted: u64,
}

/// Implementation of the gateway_install tool.
pub async fn install_impl<T: Transport + 'static>(gateway: &Gateway<T>) -> Result<CallToolResult, McpError> {
    let report = gateway.install().await?;
    let evicted = gateway.evict_stale().await?;

    let output = GatewayInstallOutput {
        generation: report.generation.to_string(),
        entries: report.entries,
        reused: report.reused,
        evicted,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::gateway_fetch::tests::{StaticSite, open_gateway, open_gateway_on};

    fn parse_output(result: &CallToolResult) -> GatewayInstallOutput {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_install_reports_entries() {
        let gateway = open_gateway(StaticSite::online(), "offgate-v1").await;

        let output = parse_output(&install_impl(&gateway).await.unwrap());
        assert_eq!(output.generation, "offgate-v1");
        assert_eq!(output.entries, 3);
        assert!(!output.reused);
        assert_eq!(output.evicted, 0);

        let again = parse_output(&install_impl(&gateway).await.unwrap());
        assert!(again.reused);
    }

    #[tokio::test]
    async fn test_install_evicts_previous_generation() {
        let old = open_gateway(StaticSite::online(), "offgate-v1").await;
        install_impl(&old).await.unwrap();

        let new = open_gateway_on(old.db().clone(), StaticSite::online(), "offgate-v2").await;
        let output = parse_output(&install_impl(&new).await.unwrap());
        assert_eq!(output.evicted, 1);
    }

    #[tokio::test]
    async fn test_install_failure_is_mcp_error() {
        let gateway = open_gateway(StaticSite::offline(), "offgate-v1").await;

        let err = install_impl(&gateway).await.unwrap_err();
        assert_eq!(err.code.0, -32020);
    }
}
