//! Content digests for generation ids and stored bodies.

use sha2::{Digest, Sha256};

/// Number of hex characters of the manifest digest kept in a generation id.
pub const GENERATION_DIGEST_LEN: usize = 12;

/// Digest of a manifest's URLs, in order, newline-separated.
pub fn manifest_digest<'a>(urls: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for url in urls {
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// SHA-256 of a response body, hex-encoded.
pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_digest_stability() {
        let a = manifest_digest(["/", "/index.html"]);
        let b = manifest_digest(["/", "/index.html"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_manifest_digest_order_sensitive() {
        let a = manifest_digest(["/", "/index.html"]);
        let b = manifest_digest(["/index.html", "/"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_manifest_digest_entry_boundaries() {
        let a = manifest_digest(["/a", "b"]);
        let b = manifest_digest(["/ab"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_body_digest_format() {
        let hash = body_digest(b"<html></html>");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_body_digest_empty() {
        assert_eq!(body_digest(b""), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
    }
}
