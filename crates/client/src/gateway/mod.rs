//! Offline cache gateway.
//!
//! ### Install
//! - Fetch every manifest URL (bounded concurrency) into a new generation.
//! - Strict: one transport error or non-2xx status fails the whole install
//!   and leaves no generation behind.
//! - Runs on its own task, so a caller giving up does not cancel it.
//!
//! ### Handle fetch
//! - Network first. Any HTTP response, 4xx and 5xx included, is returned
//!   unchanged and the cache is not consulted.
//! - On a transport failure, wait for the current generation's install to
//!   finish, then serve the stored snapshot for the URL if there is one.
//! - Otherwise the failure propagates as `UnrecoverableFetch`.
//!
//! ### Evict
//! - Explicit: deletes every generation other than the current one.

mod phase;

pub use phase::InstallPhase;

use reqwest::{Method, Url};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::JoinSet;

use offgate_core::{AppConfig, CacheDb, CacheEntry, CachedResponse, Error, GenerationId, GenerationState, Manifest};

use crate::fetch::{FetchRequest, Transport, TransportError, parse_origin, resolve};

/// What the gateway needs to know about its deployment.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Base for root-relative manifest entries and request URLs.
    pub origin: Url,
    pub manifest: Manifest,
    /// Id of the current generation.
    pub generation: GenerationId,
    /// Maximum manifest URLs fetched at once during install.
    pub install_concurrency: usize,
}

impl GatewaySettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = parse_origin(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let manifest = config.manifest().map_err(|e| Error::InvalidManifest(e.to_string()))?;
        let generation = config.generation_id().map_err(|e| Error::InvalidInput(e.to_string()))?;

        Ok(Self { origin, manifest, generation, install_concurrency: config.install_concurrency.max(1) })
    }
}

/// Where a response handed back by `handle_fetch` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
}

/// Result of a handled fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub source: ResponseSource,
    /// Absolute URL the request was sent to.
    pub url: Url,
    pub response: CachedResponse,
}

/// Result of an install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub generation: GenerationId,
    pub entries: usize,
    /// True when the generation was already ready and nothing was fetched.
    pub reused: bool,
}

struct Inner<T> {
    db: CacheDb,
    transport: T,
    settings: GatewaySettings,
    phase: watch::Sender<InstallPhase>,
    install_lock: Mutex<()>,
}

/// The offline cache gateway. Cloning shares the same state.
pub struct Gateway<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Gateway<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: Transport + 'static> Gateway<T> {
    /// Create a gateway over an opened store.
    ///
    /// Starts `Active` when the store already holds a ready copy of the
    /// current generation, `Pending` otherwise.
    pub async fn open(db: CacheDb, transport: T, settings: GatewaySettings) -> Result<Self, Error> {
        let initial = match db.generation_state(&settings.generation).await? {
            Some(GenerationState::Ready) => InstallPhase::Active,
            _ => InstallPhase::Pending,
        };
        tracing::debug!(generation = %settings.generation, phase = %initial, "gateway opened");

        let (phase, _) = watch::channel(initial);
        let inner = Inner { db, transport, settings, phase, install_lock: Mutex::new(()) };

        Ok(Self { inner: Arc::new(inner) })
    }

    pub fn generation(&self) -> &GenerationId {
        &self.inner.settings.generation
    }

    pub fn manifest(&self) -> &Manifest {
        &self.inner.settings.manifest
    }

    pub fn phase(&self) -> InstallPhase {
        self.inner.phase.borrow().clone()
    }

    pub fn db(&self) -> &CacheDb {
        &self.inner.db
    }

    /// Populate the current generation from the manifest.
    ///
    /// Idempotent once the generation is ready. Concurrent calls are
    /// serialized.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.install().await })
            .await
            .map_err(|e| Error::ProvisioningFailure(format!("install task did not complete: {e}")))?
    }

    /// Serve a request network-first, falling back to the current generation
    /// on transport failure.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, Error> {
        let url = resolve(&self.inner.settings.origin, &request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        match self.inner.transport.send(&url, request).await {
            Ok(response) => {
                tracing::debug!(
                    url = %url,
                    final_url = %response.final_url,
                    status = response.status.as_u16(),
                    fetch_ms = response.fetch_ms,
                    "served from network"
                );
                Ok(FetchOutcome { source: ResponseSource::Network, url, response: response.into_cached() })
            }
            // The network answered; only the size cap rejected it.
            Err(err @ TransportError::TooLarge { .. }) => Err(Error::ResponseTooLarge(format!("{url}: {err}"))),
            Err(err) => self.fallback(request, url, err).await,
        }
    }

    /// Delete every generation other than the current one.
    ///
    /// Does nothing while the current generation is not ready, so a failed
    /// rollover never leaves the store without a usable copy.
    pub async fn evict_stale(&self) -> Result<u64, Error> {
        let generation = self.generation();
        if self.inner.db.generation_state(generation).await? != Some(GenerationState::Ready) {
            tracing::warn!(%generation, "current generation not ready; skipping eviction");
            return Ok(0);
        }

        let evicted = self.inner.db.evict_generations_except(generation).await?;
        if evicted > 0 {
            tracing::info!(%generation, evicted, "evicted stale cache generations");
        }
        Ok(evicted)
    }

    async fn fallback(&self, request: &FetchRequest, url: Url, err: TransportError) -> Result<FetchOutcome, Error> {
        let cause = Error::TransportUnavailable(err.to_string());
        tracing::warn!(url = %url, error = %cause, "network unavailable, consulting cache");

        if request.method != Method::GET {
            return Err(Error::UnrecoverableFetch(format!(
                "{} {url}: {cause} (only GET requests are served from cache)",
                request.method
            )));
        }

        let generation = self.generation();
        let phase = self.wait_for_install().await;
        if !phase.is_active() {
            return Err(Error::UnrecoverableFetch(format!("{url}: {cause} (generation {generation} is {phase})")));
        }

        let cached = match self.inner.db.lookup_entry(generation, &request.url).await? {
            Some(response) => Some(response),
            None => self.inner.db.lookup_entry(generation, url.as_str()).await?,
        };

        match cached {
            Some(response) => {
                tracing::debug!(url = %url, %generation, "served from cache");
                Ok(FetchOutcome { source: ResponseSource::Cache, url, response })
            }
            None => Err(Error::UnrecoverableFetch(format!("{url}: {cause} (not cached in {generation})"))),
        }
    }

    async fn wait_for_install(&self) -> InstallPhase {
        let mut rx = self.inner.phase.subscribe();
        match rx.wait_for(|phase| *phase != InstallPhase::Installing).await {
            Ok(phase) => phase.clone(),
            Err(_) => InstallPhase::Failed("install state channel closed".into()),
        }
    }
}

impl<T: Transport + 'static> Inner<T> {
    async fn install(self: Arc<Self>) -> Result<InstallReport, Error> {
        let _guard = self.install_lock.lock().await;
        let generation = self.settings.generation.clone();

        if self.db.generation_state(&generation).await? == Some(GenerationState::Ready) {
            let entries = self.db.entry_urls(&generation).await?.len();
            self.phase.send_replace(InstallPhase::Active);
            tracing::debug!(%generation, entries, "generation already installed");
            return Ok(InstallReport { generation, entries, reused: true });
        }

        self.phase.send_replace(InstallPhase::Installing);
        tracing::info!(%generation, urls = self.settings.manifest.len(), "installing cache generation");

        match Arc::clone(&self).populate().await {
            Ok(entries) => {
                self.phase.send_replace(InstallPhase::Active);
                tracing::info!(%generation, entries, "cache generation ready");
                Ok(InstallReport { generation, entries, reused: false })
            }
            Err(err) => {
                if let Err(abort_err) = self.db.abort_generation(&generation).await {
                    tracing::warn!(%generation, error = %abort_err, "failed to discard partial generation");
                }
                self.phase.send_replace(InstallPhase::Failed(err.to_string()));
                tracing::error!(%generation, error = %err, "install failed");
                Err(err)
            }
        }
    }

    async fn populate(self: Arc<Self>) -> Result<usize, Error> {
        let generation = &self.settings.generation;
        let manifest = &self.settings.manifest;
        self.db.begin_generation(generation, manifest).await?;

        let semaphore = Arc::new(Semaphore::new(self.settings.install_concurrency));
        let mut join_set = JoinSet::new();

        for (index, key) in manifest.iter().enumerate() {
            let inner = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            let key = key.to_string();

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::ProvisioningFailure(format!("{key}: {e}")))?;
                inner.provision(&key).await.map(|entry| (index, entry))
            });
        }

        // Dropping the set on the first error aborts the remaining fetches.
        let mut slots: Vec<Option<CacheEntry>> = vec![None; manifest.len()];
        while let Some(joined) = join_set.join_next().await {
            let (index, entry) =
                joined.map_err(|e| Error::ProvisioningFailure(format!("manifest fetch task failed: {e}")))??;
            slots[index] = Some(entry);
        }

        let entries = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::ProvisioningFailure("manifest entry missing after fetch".into()))?;

        self.db.commit_generation(generation, entries).await
    }

    async fn provision(&self, key: &str) -> Result<CacheEntry, Error> {
        let url = resolve(&self.settings.origin, key).map_err(|e| Error::ProvisioningFailure(format!("{key}: {e}")))?;

        let response = self
            .transport
            .send(&url, &FetchRequest::get(key))
            .await
            .map_err(|e| Error::ProvisioningFailure(format!("{key}: {e}")))?;

        if !response.status.is_success() {
            return Err(Error::ProvisioningFailure(format!("{key}: status {}", response.status.as_u16())));
        }

        tracing::debug!(
            key,
            url = %url,
            final_url = %response.final_url,
            bytes = response.body.len(),
            fetch_ms = response.fetch_ms,
            "stored manifest entry"
        );

        Ok(CacheEntry { url: key.to_string(), resolved_url: url.to_string(), response: response.into_cached() })
    }
}
