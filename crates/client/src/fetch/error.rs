//! Transport-level failures.
//!
//! These are failures to obtain any HTTP response at all. A 404 or 500 is a
//! response and never becomes a `TransportError`.

/// Errors from sending a request over the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The transport's own timeout elapsed.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection could not be established (refused, unreachable, DNS).
    #[error("connection failed: {0}")]
    Connect(String),

    /// Response body exceeded the configured cap.
    #[error("response too large: {len} bytes exceeds {max}")]
    TooLarge { len: u64, max: usize },

    /// Any other failure below HTTP (reset, body read, redirect loop).
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::Connect("connection refused".to_string());
        assert!(err.to_string().contains("connection failed"));

        let err = TransportError::TooLarge { len: 10, max: 5 };
        assert_eq!(err.to_string(), "response too large: 10 bytes exceeds 5");
    }
}
