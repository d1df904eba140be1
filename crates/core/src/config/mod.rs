//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFGATE_*)
//! 2. TOML config file (if OFFGATE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::manifest::DEFAULT_MANIFEST;
use crate::{GenerationId, Manifest};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFGATE_*)
/// 2. TOML config file (if OFFGATE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache store.
    ///
    /// Set via OFFGATE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin that root-relative manifest and request URLs resolve against.
    ///
    /// Set via OFFGATE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Ordered list of URLs stored at install time.
    ///
    /// Set via OFFGATE_MANIFEST environment variable (e.g. `["/", "/index.html"]`).
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Prefix of derived generation ids.
    ///
    /// Set via OFFGATE_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag of derived generation ids; bump on every deploy.
    ///
    /// Set via OFFGATE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Explicit generation id, overriding derivation from prefix/version/manifest.
    ///
    /// Set via OFFGATE_GENERATION_ID environment variable.
    #[serde(default)]
    pub generation_id: Option<String>,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via OFFGATE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Transport timeout in milliseconds.
    ///
    /// Set via OFFGATE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to read per response.
    ///
    /// Set via OFFGATE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Maximum manifest URLs fetched concurrently during install.
    ///
    /// Set via OFFGATE_INSTALL_CONCURRENCY environment variable.
    #[serde(default = "default_install_concurrency")]
    pub install_concurrency: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offgate-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_manifest() -> Vec<String> {
    DEFAULT_MANIFEST.iter().map(|s| (*s).to_string()).collect()
}

fn default_cache_prefix() -> String {
    "offgate".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_user_agent() -> String {
    "offgate/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_install_concurrency() -> usize {
    4
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            manifest: default_manifest(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            generation_id: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            install_concurrency: default_install_concurrency(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFGATE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFGATE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The validated manifest.
    pub fn manifest(&self) -> Result<Manifest, ConfigError> {
        Manifest::new(self.manifest.iter().cloned())
            .map_err(|e| ConfigError::Invalid { field: "manifest".into(), reason: e.to_string() })
    }

    /// The current generation id: explicit if configured, derived otherwise.
    pub fn generation_id(&self) -> Result<GenerationId, ConfigError> {
        match &self.generation_id {
            Some(id) => GenerationId::new(id.clone())
                .map_err(|e| ConfigError::Invalid { field: "generation_id".into(), reason: e.to_string() }),
            None => Ok(GenerationId::derive(&self.cache_prefix, &self.cache_version, &self.manifest()?)),
        }
    }
}
