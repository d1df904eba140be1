//! Unified error types for offgate.
//!
//! Network outcomes are split three ways: install-time failures, transport
//! failures that the fallback path can still recover from, and fetches that
//! neither the network nor the current generation could answer.
//! HTTP error statuses are responses, not errors, and never appear here.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the offline cache gateway.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty request URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Manifest is empty or contains blank/duplicate entries.
    #[error("INVALID_MANIFEST: {0}")]
    InvalidManifest(String),

    /// A manifest URL could not be retrieved while installing a generation.
    #[error("PROVISIONING_FAILURE: {0}")]
    ProvisioningFailure(String),

    /// The network failed below HTTP (unreachable, timeout, DNS).
    #[error("TRANSPORT_UNAVAILABLE: {0}")]
    TransportUnavailable(String),

    /// The network answered, but the body exceeded the configured cap.
    #[error("RESPONSE_TOO_LARGE: {0}")]
    ResponseTooLarge(String),

    /// Transport failed and the current generation had no answer either.
    #[error("UNRECOVERABLE_FETCH: {0}")]
    UnrecoverableFetch(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored data no longer matches what was written at install time.
    #[error("CACHE_ERROR: integrity check failed: {0}")]
    Integrity(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Integrity(format!("malformed stored JSON: {err}"))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32602, msg.clone()),
            Error::InvalidManifest(msg) => (-32003, msg.clone()),
            Error::ProvisioningFailure(msg) => (-32020, msg.clone()),
            Error::TransportUnavailable(msg) => (-32021, msg.clone()),
            Error::UnrecoverableFetch(msg) => (-32022, msg.clone()),
            Error::ResponseTooLarge(msg) => (-32023, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::Integrity(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnrecoverableFetch("/index.html".to_string());
        assert!(err.to_string().contains("UNRECOVERABLE_FETCH"));
        assert!(err.to_string().contains("/index.html"));
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::ProvisioningFailure("/manifest.json: status 404".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32020);

        let mcp_err: McpError = Error::UnrecoverableFetch("/".to_string()).into();
        assert_eq!(mcp_err.code.0, -32022);

        let mcp_err: McpError = Error::ResponseTooLarge("/app.js".to_string()).into();
        assert_eq!(mcp_err.code.0, -32023);
    }

    #[test]
    fn test_invalid_input_codes() {
        let mcp_err: McpError = Error::InvalidUrl("ftp://x".to_string()).into();
        assert_eq!(mcp_err.code.0, -32602);

        let mcp_err: McpError = Error::InvalidManifest("manifest is empty".to_string()).into();
        assert_eq!(mcp_err.code.0, -32003);
    }
}
