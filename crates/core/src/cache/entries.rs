//! Response snapshots stored inside a generation.

use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::generations::{GenerationId, GenerationState};
use super::hash::body_digest;
use crate::Error;

/// Immutable snapshot of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    /// Header name/value pairs in the order they were received.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CachedResponse {
    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A manifest URL and the response captured for it at install time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Manifest entry, verbatim. This is the cache key.
    pub url: String,
    /// Absolute URL the entry was fetched from.
    pub resolved_url: String,
    pub response: CachedResponse,
}

pub(crate) fn insert_entry(
    conn: &rusqlite::Connection, generation: &GenerationId, entry: &CacheEntry, stored_at: &str,
) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&entry.response.headers)
        .map_err(|e| Error::InvalidInput(format!("failed to serialize headers: {e}")))?;

    conn.execute(
        "INSERT INTO entries (
            generation_id, url, resolved_url, status, headers_json, body, body_sha256, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            generation.as_str(),
            &entry.url,
            &entry.resolved_url,
            i64::from(entry.response.status),
            headers_json,
            &entry.response.body,
            body_digest(&entry.response.body),
            stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Look up a snapshot in a ready generation.
    ///
    /// `key` matches either the verbatim manifest entry or the absolute URL it
    /// was fetched from; an exact manifest match wins. Returns None when the
    /// generation is missing, not ready, or has no such entry.
    pub async fn lookup_entry(&self, generation: &GenerationId, key: &str) -> Result<Option<CachedResponse>, Error> {
        let generation = generation.clone();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.status, e.headers_json, e.body, e.body_sha256
                     FROM entries e
                     JOIN generations g ON g.id = e.generation_id
                     WHERE e.generation_id = ?1
                       AND g.state = ?2
                       AND (e.url = ?3 OR e.resolved_url = ?3)
                     ORDER BY (e.url = ?3) DESC
                     LIMIT 1",
                )?;

                let result = stmt.query_row(
                    params![generation.as_str(), GenerationState::Ready.as_str(), key],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Vec<u8>>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                );

                let (status, headers_json, body, digest) = match result {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                if body_digest(&body) != digest {
                    return Err(Error::Integrity(format!("body digest mismatch for {key} in {generation}")));
                }

                let status = u16::try_from(status)
                    .map_err(|_| Error::Integrity(format!("stored status out of range: {status}")))?;

                Ok(Some(CachedResponse { status, headers: serde_json::from_str(&headers_json)?, body }))
            })
            .await
            .map_err(Error::from)
    }

    /// Manifest keys stored in a generation, in insertion order.
    pub async fn entry_urls(&self, generation: &GenerationId) -> Result<Vec<String>, Error> {
        let generation = generation.clone();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation_id = ?1 ORDER BY rowid ASC")?;
                let urls = stmt
                    .query_map(params![generation.as_str()], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Manifest;

    fn snapshot(body: &[u8]) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: vec![
                ("Content-Type".into(), "text/html; charset=utf-8".into()),
                ("ETag".into(), "\"abc\"".into()),
            ],
            body: body.to_vec(),
        }
    }

    async fn ready_generation(db: &CacheDb, id: &str, entries: Vec<CacheEntry>) -> GenerationId {
        let id = GenerationId::new(id).unwrap();
        let manifest = Manifest::new(entries.iter().map(|e| e.url.clone())).unwrap();
        db.begin_generation(&id, &manifest).await.unwrap();
        db.commit_generation(&id, entries).await.unwrap();
        id
    }

    #[test]
    fn test_header_case_insensitive() {
        let response = snapshot(b"");
        assert_eq!(response.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(response.header("etag"), Some("\"abc\""));
        assert_eq!(response.header("x-missing"), None);
    }

    #[tokio::test]
    async fn test_lookup_by_key_and_resolved_url() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let body = b"\x00\x01binary\xffpayload".to_vec();
        let id = ready_generation(
            &db,
            "gen",
            vec![CacheEntry {
                url: "/index.html".into(),
                resolved_url: "https://app.example.com/index.html".into(),
                response: snapshot(&body),
            }],
        )
        .await;

        let by_key = db.lookup_entry(&id, "/index.html").await.unwrap().unwrap();
        assert_eq!(by_key.body, body);
        assert_eq!(by_key.headers, snapshot(&body).headers);

        let by_url = db
            .lookup_entry(&id, "https://app.example.com/index.html")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_url, by_key);
    }

    #[tokio::test]
    async fn test_lookup_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let id = ready_generation(
            &db,
            "gen",
            vec![CacheEntry { url: "/".into(), resolved_url: "https://app.example.com/".into(), response: snapshot(b"root") }],
        )
        .await;

        assert!(db.lookup_entry(&id, "/other").await.unwrap().is_none());
        let unknown = GenerationId::new("unknown").unwrap();
        assert!(db.lookup_entry(&unknown, "/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_ignores_installing_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let id = GenerationId::new("pending").unwrap();
        db.begin_generation(&id, &Manifest::new(["/"]).unwrap()).await.unwrap();

        assert!(db.lookup_entry(&id, "/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_detects_tampered_body() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let id = ready_generation(
            &db,
            "gen",
            vec![CacheEntry { url: "/".into(), resolved_url: "https://app.example.com/".into(), response: snapshot(b"root") }],
        )
        .await;

        db.conn
            .call(|conn| conn.execute("UPDATE entries SET body = X'00'", []))
            .await
            .unwrap();

        let result = db.lookup_entry(&id, "/").await;
        assert!(matches!(result, Err(Error::Integrity(_))));
    }

    #[tokio::test]
    async fn test_entry_urls_in_manifest_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let urls = ["/manifest.json", "/", "/index.html"];
        let entries = urls
            .iter()
            .map(|u| CacheEntry {
                url: (*u).to_string(),
                resolved_url: format!("https://app.example.com{u}"),
                response: snapshot(u.as_bytes()),
            })
            .collect();
        let id = ready_generation(&db, "gen", entries).await;

        assert_eq!(db.entry_urls(&id).await.unwrap(), urls);
    }
}
