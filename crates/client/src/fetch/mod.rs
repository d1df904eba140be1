//! Network transport for the gateway.
//!
//! ### Transport contract
//! - Any HTTP response, whatever its status, is a success of the transport.
//! - Only failures that prevent a response from being obtained (connect,
//!   DNS, timeout, body read, size cap) are `TransportError`s.
//!
//! ### Limits
//! - Timeout: the reqwest client timeout (default 20s)
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod error;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, Method, StatusCode, Url};
use std::sync::Arc;
use std::time::{Duration, Instant};

use offgate_core::{AppConfig, CachedResponse, Error};

pub use self::error::TransportError;
pub use self::url::{UrlError, parse_origin, resolve};

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offgate/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offgate/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// An outbound request descriptor.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Request URL as given by the caller; absolute or root-relative.
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
}

impl FetchRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { url: url.into(), method, headers: HeaderMap::new() }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Build a request from untyped parts, as received over the tool surface.
    pub fn from_parts(method: &str, url: &str, headers: &[(String, String)]) -> Result<Self, Error> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {method}")))?;

        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidInput(format!("invalid header name: {name}")))?;
            let value = header::HeaderValue::from_str(value)
                .map_err(|_| Error::InvalidInput(format!("invalid value for header {name}")))?;
            map.append(name, value);
        }

        Ok(Self { url: url.to_string(), method, headers: map })
    }
}

/// A response obtained from the network.
#[derive(Debug, Clone)]
pub struct NetworkResponse {
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body bytes
    pub body: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl NetworkResponse {
    /// Snapshot the response for storage or for handing back to the caller.
    pub fn into_cached(self) -> CachedResponse {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();

        CachedResponse { status: self.status.as_u16(), headers, body: self.body.to_vec() }
    }
}

/// Sends requests to the network.
///
/// `url` is the absolute form of `request.url`, already resolved against the
/// gateway's origin.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &Url, request: &FetchRequest) -> Result<NetworkResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, url: &Url, request: &FetchRequest) -> Result<NetworkResponse, TransportError> {
        (**self).send(url, request).await
    }
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    config: FetchConfig,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &Url, request: &FetchRequest) -> Result<NetworkResponse, TransportError> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone())
            .send()
            .await?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len > self.config.max_bytes as u64
        {
            return Err(TransportError::TooLarge { len, max: self.config.max_bytes });
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        if body.len() > self.config.max_bytes {
            return Err(TransportError::TooLarge { len: body.len() as u64, max: self.config.max_bytes });
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "{} {} -> {} in {}ms ({} bytes)",
            request.method,
            url,
            status.as_u16(),
            fetch_ms,
            body.len()
        );

        Ok(NetworkResponse { final_url, status, headers, body, fetch_ms })
    }
}
