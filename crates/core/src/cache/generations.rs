//! Generation lifecycle rows.
//!
//! A generation is created in `installing` state, populated, and flipped to
//! `ready` in the same transaction that writes its entries. Readers only ever
//! see ready generations, so a partially populated bucket is never served.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::entries::{CacheEntry, insert_entry};
use super::hash::{GENERATION_DIGEST_LEN, manifest_digest};
use crate::{Error, Manifest};

/// Identifier of a cache generation, unique per deployable version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct GenerationId(String);

impl GenerationId {
    /// Wrap an explicit identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, Error> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidInput("generation id must not be empty".into()));
        }
        Ok(Self(id))
    }

    /// Derive `{prefix}-{version}-{digest}` from the manifest, so any change
    /// to the version tag or the asset list yields a new generation.
    pub fn derive(prefix: &str, version: &str, manifest: &Manifest) -> Self {
        let digest = manifest_digest(manifest.iter());
        Self(format!("{prefix}-{version}-{}", &digest[..GENERATION_DIGEST_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted lifecycle state of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Installing,
    Ready,
}

impl GenerationState {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            GenerationState::Installing => "installing",
            GenerationState::Ready => "ready",
        }
    }

    fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "installing" => Ok(GenerationState::Installing),
            "ready" => Ok(GenerationState::Ready),
            other => Err(Error::Integrity(format!("unknown generation state: {other}"))),
        }
    }
}

/// Summary of a stored generation.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerationInfo {
    pub id: GenerationId,
    pub state: GenerationState,
    pub manifest: Vec<String>,
    pub created_at: String,
    pub ready_at: Option<String>,
    pub entries: u64,
}

impl CacheDb {
    /// Record the start of an install.
    ///
    /// Any earlier `installing` row for the same id is dropped first. Fails if
    /// the generation is already ready: ready generations are immutable.
    pub async fn begin_generation(&self, id: &GenerationId, manifest: &Manifest) -> Result<(), Error> {
        let id = id.clone();
        let manifest_json = serde_json::to_string(manifest.urls())
            .map_err(|e| Error::InvalidManifest(format!("failed to serialize manifest: {e}")))?;
        let created_at = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM generations WHERE id = ?1 AND state = ?2",
                    params![id.as_str(), GenerationState::Installing.as_str()],
                )?;
                let inserted = tx.execute(
                    "INSERT INTO generations (id, state, manifest_json, created_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO NOTHING",
                    params![id.as_str(), GenerationState::Installing.as_str(), manifest_json, created_at],
                )?;
                if inserted == 0 {
                    return Err(Error::Integrity(format!("generation {id} is already ready")));
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Write every entry and mark the generation ready, atomically.
    ///
    /// Returns the number of entries written.
    pub async fn commit_generation(&self, id: &GenerationId, entries: Vec<CacheEntry>) -> Result<usize, Error> {
        let id = id.clone();
        let ready_at = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                for entry in &entries {
                    insert_entry(&tx, &id, entry, &ready_at)?;
                }
                let updated = tx.execute(
                    "UPDATE generations SET state = ?1, ready_at = ?2 WHERE id = ?3 AND state = ?4",
                    params![
                        GenerationState::Ready.as_str(),
                        ready_at,
                        id.as_str(),
                        GenerationState::Installing.as_str()
                    ],
                )?;
                if updated == 0 {
                    return Err(Error::Integrity(format!("generation {id} is not installing")));
                }
                tx.commit()?;
                Ok(entries.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Drop a generation whose install failed. Ready generations are left alone.
    pub async fn abort_generation(&self, id: &GenerationId) -> Result<bool, Error> {
        let id = id.clone();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM generations WHERE id = ?1 AND state = ?2",
                    params![id.as_str(), GenerationState::Installing.as_str()],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every generation still marked `installing`.
    ///
    /// Called when a store is opened: an install interrupted by process exit
    /// counts as failed.
    pub async fn discard_interrupted(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM generations WHERE state = ?1",
                    params![GenerationState::Installing.as_str()],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Get the persisted state of a generation, if it exists.
    pub async fn generation_state(&self, id: &GenerationId) -> Result<Option<GenerationState>, Error> {
        let id = id.clone();
        self.conn
            .call(move |conn| -> Result<Option<GenerationState>, Error> {
                let result = conn.query_row(
                    "SELECT state FROM generations WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get::<_, String>(0),
                );
                match result {
                    Ok(state) => GenerationState::parse(&state).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// List all stored generations, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<GenerationInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.id, g.state, g.manifest_json, g.created_at, g.ready_at,
                            (SELECT COUNT(*) FROM entries e WHERE e.generation_id = g.id)
                     FROM generations g
                     ORDER BY g.created_at ASC, g.id ASC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                })?;

                let mut out = Vec::new();
                for row in rows {
                    let (id, state, manifest_json, created_at, ready_at, entries) = row?;
                    out.push(GenerationInfo {
                        id: GenerationId(id),
                        state: GenerationState::parse(&state)?,
                        manifest: serde_json::from_str(&manifest_json)?,
                        created_at,
                        ready_at,
                        entries: entries as u64,
                    });
                }
                Ok(out)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every generation except `keep`, entries included.
    ///
    /// Returns the number of generations deleted.
    pub async fn evict_generations_except(&self, keep: &GenerationId) -> Result<u64, Error> {
        let keep = keep.clone();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM generations WHERE id != ?1", params![keep.as_str()])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
