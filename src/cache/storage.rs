//! Namespaced response storage for the caching proxy, on SQLite.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use tracing::debug;

/// Versioned namespace for the install-time shell manifest. Bump the version
/// when the shell contents change shape; stale versions are purged on open.
pub const STATIC_NAMESPACE: &str = "static-cache-v1";

/// Namespace for lazily observed responses.
pub const RUNTIME_NAMESPACE: &str = "runtime-cache";

/// A stored response: enough to replay it to the caller while offline.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  /// When the response was observed (set on store, not by the caller)
  pub fetched_at: Option<DateTime<Utc>>,
}

impl CachedResponse {
  /// Deserialize the body as JSON.
  pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
    serde_json::from_slice(&self.body).map_err(|e| eyre!("Failed to parse response body: {}", e))
  }
}

/// Stable fixed-length key for a request identity.
pub fn request_key(method: &str, url: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(method.as_bytes());
  hasher.update(b" ");
  hasher.update(url.as_bytes());
  hex::encode(hasher.finalize())
}

/// Trait for response cache backends.
pub trait CacheStorage: Send + Sync {
  /// Store one response under a namespace, keyed by request identity.
  fn put(&self, namespace: &str, method: &str, url: &str, response: &CachedResponse) -> Result<()>;

  /// Store a batch atomically: either every entry lands or none do.
  fn put_batch(
    &self,
    namespace: &str,
    entries: &[(String, CachedResponse)],
  ) -> Result<()>;

  /// Most recent stored response for a request identity, searching the
  /// static namespace before the runtime one.
  fn lookup(&self, method: &str, url: &str) -> Result<Option<CachedResponse>>;

  /// Number of entries in a namespace.
  fn count(&self, namespace: &str) -> Result<usize>;
}

/// SQLite-backed cache storage with TTL and capacity eviction for the
/// runtime namespace.
pub struct SqliteCacheStorage {
  conn: Mutex<Connection>,
  ttl_hours: i64,
  max_entries: usize,
}

const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS response_cache (
    namespace TEXT NOT NULL,
    cache_key TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, cache_key)
);

CREATE INDEX IF NOT EXISTS idx_response_cache_url ON response_cache(method, url);
"#;

impl SqliteCacheStorage {
  /// Open the cache at the default location.
  pub fn open(ttl_hours: i64, max_entries: usize) -> Result<Self> {
    let path = Self::default_path()?;

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn, ttl_hours, max_entries)
  }

  /// Open an in-memory cache. Used by tests.
  pub fn open_in_memory(ttl_hours: i64, max_entries: usize) -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::from_connection(conn, ttl_hours, max_entries)
  }

  fn from_connection(conn: Connection, ttl_hours: i64, max_entries: usize) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
      ttl_hours,
      max_entries,
    };
    storage.run_migrations()?;
    storage.purge_stale_static()?;
    Ok(storage)
  }

  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("tally").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  /// Drop static namespaces left behind by earlier versions.
  fn purge_stale_static(&self) -> Result<()> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let purged = conn
      .execute(
        "DELETE FROM response_cache WHERE namespace LIKE 'static-cache-%' AND namespace != ?",
        params![STATIC_NAMESPACE],
      )
      .map_err(|e| eyre!("Failed to purge stale static caches: {}", e))?;

    if purged > 0 {
      debug!(purged, "dropped entries from stale static cache versions");
    }

    Ok(())
  }

  /// TTL then capacity, oldest entries first. Only the runtime namespace is
  /// evicted; the static namespace is fixed at install.
  fn evict_runtime(&self, conn: &Connection) -> Result<()> {
    conn
      .execute(
        "DELETE FROM response_cache
         WHERE namespace = ? AND cached_at < datetime('now', ?)",
        params![RUNTIME_NAMESPACE, format!("-{} hours", self.ttl_hours)],
      )
      .map_err(|e| eyre!("Failed to evict expired cache entries: {}", e))?;

    conn
      .execute(
        "DELETE FROM response_cache
         WHERE namespace = ?1 AND cache_key NOT IN (
           SELECT cache_key FROM response_cache WHERE namespace = ?1
           ORDER BY cached_at DESC, rowid DESC LIMIT ?2
         )",
        params![RUNTIME_NAMESPACE, self.max_entries],
      )
      .map_err(|e| eyre!("Failed to evict over-capacity cache entries: {}", e))?;

    Ok(())
  }
}

impl CacheStorage for SqliteCacheStorage {
  fn put(&self, namespace: &str, method: &str, url: &str, response: &CachedResponse) -> Result<()> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let headers = serde_json::to_string(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO response_cache
           (namespace, cache_key, method, url, status, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          namespace,
          request_key(method, url),
          method,
          url,
          response.status,
          headers,
          response.body,
        ],
      )
      .map_err(|e| eyre!("Failed to store cached response: {}", e))?;

    if namespace == RUNTIME_NAMESPACE {
      self.evict_runtime(&conn)?;
    }

    Ok(())
  }

  fn put_batch(&self, namespace: &str, entries: &[(String, CachedResponse)]) -> Result<()> {
    let mut conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for (url, response) in entries {
      let headers = serde_json::to_string(&response.headers)
        .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

      tx.execute(
        "INSERT OR REPLACE INTO response_cache
           (namespace, cache_key, method, url, status, headers, body, cached_at)
         VALUES (?, ?, 'GET', ?, ?, ?, ?, datetime('now'))",
        params![
          namespace,
          request_key("GET", url),
          url,
          response.status,
          headers,
          response.body,
        ],
      )
      .map_err(|e| eyre!("Failed to store cached response for {}: {}", url, e))?;
    }

    tx.commit().map_err(|e| eyre!("Failed to commit cache batch: {}", e))?;

    Ok(())
  }

  fn lookup(&self, method: &str, url: &str) -> Result<Option<CachedResponse>> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT status, headers, body, cached_at FROM response_cache
         WHERE cache_key = ?
         ORDER BY CASE namespace WHEN ? THEN 0 ELSE 1 END, cached_at DESC
         LIMIT 1",
      )
      .map_err(|e| eyre!("Failed to prepare cache lookup: {}", e))?;

    let row: Option<(u16, String, Vec<u8>, String)> = stmt
      .query_row(params![request_key(method, url), STATIC_NAMESPACE], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })
      .ok();

    match row {
      Some((status, headers, body, cached_at)) => {
        let headers: Vec<(String, String)> = serde_json::from_str(&headers)
          .map_err(|e| eyre!("Failed to parse cached headers: {}", e))?;
        Ok(Some(CachedResponse {
          status,
          headers,
          body,
          fetched_at: Some(parse_datetime(&cached_at)?),
        }))
      }
      None => Ok(None),
    }
  }

  fn count(&self, namespace: &str) -> Result<usize> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM response_cache WHERE namespace = ?",
        params![namespace],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count cache entries: {}", e))?;

    Ok(count as usize)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn response(body: &str) -> CachedResponse {
    CachedResponse {
      status: 200,
      headers: vec![("content-type".to_string(), "application/json".to_string())],
      body: body.as_bytes().to_vec(),
      fetched_at: None,
    }
  }

  #[test]
  fn test_put_then_lookup() {
    let storage = SqliteCacheStorage::open_in_memory(24, 16).unwrap();

    storage
      .put(RUNTIME_NAMESPACE, "GET", "http://x/api/transaction", &response("[]"))
      .unwrap();

    let hit = storage.lookup("GET", "http://x/api/transaction").unwrap().unwrap();
    assert_eq!(hit.status, 200);
    assert_eq!(hit.body, b"[]");
    assert!(hit.fetched_at.is_some());
  }

  #[test]
  fn test_lookup_miss() {
    let storage = SqliteCacheStorage::open_in_memory(24, 16).unwrap();
    assert!(storage.lookup("GET", "http://x/nothing").unwrap().is_none());
  }

  #[test]
  fn test_put_overwrites_by_request_identity() {
    let storage = SqliteCacheStorage::open_in_memory(24, 16).unwrap();

    storage
      .put(RUNTIME_NAMESPACE, "GET", "http://x/api/transaction", &response("old"))
      .unwrap();
    storage
      .put(RUNTIME_NAMESPACE, "GET", "http://x/api/transaction", &response("new"))
      .unwrap();

    let hit = storage.lookup("GET", "http://x/api/transaction").unwrap().unwrap();
    assert_eq!(hit.body, b"new");
    assert_eq!(storage.count(RUNTIME_NAMESPACE).unwrap(), 1);
  }

  #[test]
  fn test_capacity_eviction_drops_oldest() {
    let storage = SqliteCacheStorage::open_in_memory(24, 2).unwrap();

    storage.put(RUNTIME_NAMESPACE, "GET", "http://x/a", &response("a")).unwrap();
    storage.put(RUNTIME_NAMESPACE, "GET", "http://x/b", &response("b")).unwrap();
    storage.put(RUNTIME_NAMESPACE, "GET", "http://x/c", &response("c")).unwrap();

    assert_eq!(storage.count(RUNTIME_NAMESPACE).unwrap(), 2);
    assert!(storage.lookup("GET", "http://x/a").unwrap().is_none());
    assert!(storage.lookup("GET", "http://x/c").unwrap().is_some());
  }

  #[test]
  fn test_static_namespace_not_capacity_evicted() {
    let storage = SqliteCacheStorage::open_in_memory(24, 1).unwrap();

    let entries = vec![
      ("http://x/".to_string(), response("root")),
      ("http://x/index.html".to_string(), response("html")),
      ("http://x/styles.css".to_string(), response("css")),
    ];
    storage.put_batch(STATIC_NAMESPACE, &entries).unwrap();

    assert_eq!(storage.count(STATIC_NAMESPACE).unwrap(), 3);
  }

  #[test]
  fn test_static_preferred_over_runtime_on_lookup() {
    let storage = SqliteCacheStorage::open_in_memory(24, 16).unwrap();

    storage
      .put_batch(
        STATIC_NAMESPACE,
        &[("http://x/index.html".to_string(), response("installed"))],
      )
      .unwrap();
    storage
      .put(RUNTIME_NAMESPACE, "GET", "http://x/index.html", &response("observed"))
      .unwrap();

    let hit = storage.lookup("GET", "http://x/index.html").unwrap().unwrap();
    assert_eq!(hit.body, b"installed");
  }

  #[test]
  fn test_stale_static_versions_purged_on_open() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(CACHE_SCHEMA).unwrap();
    conn
      .execute(
        "INSERT INTO response_cache (namespace, cache_key, method, url, status, headers, body)
         VALUES ('static-cache-v0', 'k', 'GET', 'http://x/', 200, '[]', x'')",
        [],
      )
      .unwrap();

    let storage = SqliteCacheStorage::from_connection(conn, 24, 16).unwrap();
    assert_eq!(storage.count("static-cache-v0").unwrap(), 0);
  }
}
