//! The static asset manifest.
//!
//! A manifest is the ordered list of URLs that must be stored in a generation
//! before it can serve fallback responses. Entries are kept verbatim: they are
//! the cache keys, so no normalization happens here.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::Error;

/// Root document, entry HTML and web app manifest.
pub const DEFAULT_MANIFEST: &[&str] = &["/", "/index.html", "/manifest.json"];

/// Ordered, duplicate-free list of URLs pre-populated at install time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Manifest {
    urls: Vec<String>,
}

impl Manifest {
    /// Build a manifest, rejecting empty lists, blank entries and duplicates.
    pub fn new<I, S>(urls: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Vec<String> = urls.into_iter().map(Into::into).collect();

        if urls.is_empty() {
            return Err(Error::InvalidManifest("manifest must list at least one URL".into()));
        }

        let mut seen = HashSet::with_capacity(urls.len());
        for url in &urls {
            if url.trim().is_empty() {
                return Err(Error::InvalidManifest("manifest contains a blank URL".into()));
            }
            if !seen.insert(url.as_str()) {
                return Err(Error::InvalidManifest(format!("duplicate manifest URL: {url}")));
            }
        }

        Ok(Self { urls })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self { urls: DEFAULT_MANIFEST.iter().map(|s| (*s).to_string()).collect() }
    }
}

impl TryFrom<Vec<String>> for Manifest {
    type Error = Error;

    fn try_from(urls: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(urls)
    }
}

impl From<Manifest> for Vec<String> {
    fn from(manifest: Manifest) -> Self {
        manifest.urls
    }
}
