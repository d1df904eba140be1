//! URL resolution for manifest entries and request descriptors.
//!
//! Cache keys stay verbatim; resolution only decides where the network
//! request goes.

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("origin has no host: {0}")]
    MissingHost(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse the gateway origin. Must be an absolute http(s) URL with a host.
pub fn parse_origin(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    check_scheme(&parsed)?;
    if !parsed.has_host() {
        return Err(UrlError::MissingHost(trimmed.to_string()));
    }
    Ok(parsed)
}

/// Resolve a manifest entry or request URL against the origin.
///
/// 1. Trim leading/trailing whitespace
/// 2. Absolute URLs are parsed as-is, anything else is joined onto `origin`
/// 3. Only http and https are allowed
/// 4. Remove fragment (#...), keep the query string intact
pub fn resolve(origin: &url::Url, input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut resolved = if trimmed.contains("://") {
        url::Url::parse(trimmed)
    } else {
        origin.join(trimmed)
    }
    .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    check_scheme(&resolved)?;
    resolved.set_fragment(None);

    Ok(resolved)
}

fn check_scheme(url: &url::Url) -> Result<(), UrlError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> url::Url {
        parse_origin("https://app.example.com").unwrap()
    }

    #[test]
    fn test_resolve_root() {
        let url = resolve(&origin(), "/").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/");
    }

    #[test]
    fn test_resolve_root_relative() {
        let url = resolve(&origin(), "/index.html").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/index.html");
    }

    #[test]
    fn test_resolve_absolute_other_host() {
        let url = resolve(&origin(), "https://cdn.example.net/app.js").unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.net"));
    }

    #[test]
    fn test_resolve_remove_fragment() {
        let url = resolve(&origin(), "/index.html#top").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/index.html");
    }

    #[test]
    fn test_resolve_preserve_query() {
        let url = resolve(&origin(), "/manifest.json?v=2&b=1").unwrap();
        assert_eq!(url.query(), Some("v=2&b=1"));
    }

    #[test]
    fn test_resolve_trim_whitespace() {
        let url = resolve(&origin(), "  /index.html  ").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/index.html");
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        let result = resolve(&origin(), "file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&origin(), ""), Err(UrlError::Empty)));
        assert!(matches!(resolve(&origin(), "   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_parse_origin_requires_http() {
        assert!(matches!(parse_origin("ftp://example.com"), Err(UrlError::UnsupportedScheme(_))));
        assert!(matches!(parse_origin("example.com"), Err(UrlError::InvalidUrl(_))));
    }

    #[test]
    fn test_parse_origin_with_port() {
        let url = parse_origin("http://localhost:8080").unwrap();
        assert_eq!(url.port(), Some(8080));
    }
}
