//! The request proxy: orchestrates policy selection, network fetching and
//! cache storage for every outbound request.

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::{Origin, Url};

use super::policy::{classify, FetchPolicy};
use super::storage::{CacheStorage, CachedResponse, RUNTIME_NAMESPACE, STATIC_NAMESPACE};

/// Intermediary between the application and the network.
///
/// Independent requests are independent suspension chains; the only shared
/// state between them is the cache storage itself.
pub struct RequestProxy<S: CacheStorage> {
  http: reqwest::Client,
  storage: Arc<S>,
  base: Url,
  origin: Origin,
  api_prefix: String,
}

impl<S: CacheStorage> RequestProxy<S> {
  pub fn new(server_url: &str, api_prefix: &str, storage: S) -> Result<Self> {
    let base = Url::parse(server_url).map_err(|e| eyre!("Invalid server URL {}: {}", server_url, e))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self {
      http,
      storage: Arc::new(storage),
      origin: base.origin(),
      base,
      api_prefix: api_prefix.to_string(),
    })
  }

  /// Resolve a server-relative path against the configured base URL.
  pub fn url(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| eyre!("Invalid request path {}: {}", path, e))
  }

  /// Prefetch the shell manifest into the versioned static namespace.
  ///
  /// The whole batch is fetched concurrently and stored in one transaction:
  /// a single failed resource fails the install, leaving the namespace as it
  /// was.
  pub async fn install(&self, manifest: &[String]) -> Result<()> {
    let fetches = manifest.iter().map(|path| {
      let url = self.url(path);
      async move {
        let url = url?;
        let response = self.fetch(Method::GET, url.clone(), None::<&()>).await?;
        Ok::<_, color_eyre::Report>((url.to_string(), response))
      }
    });

    let entries = try_join_all(fetches).await?;
    self.storage.put_batch(STATIC_NAMESPACE, &entries)?;

    debug!(
      resources = self.storage.count(STATIC_NAMESPACE)?,
      "installed static shell cache"
    );
    Ok(())
  }

  /// GET a URL through the caching policies.
  pub async fn get(&self, url: Url) -> Result<CachedResponse> {
    match classify(&Method::GET, &url, &self.origin, &self.api_prefix) {
      FetchPolicy::Bypass => self.fetch(Method::GET, url, None::<&()>).await,
      FetchPolicy::NetworkFirst => self.network_first(url).await,
      FetchPolicy::CacheFirst => self.cache_first(url).await,
    }
  }

  /// POST a JSON body. Writes are never cached, so this always bypasses.
  pub async fn post_json<B: Serialize>(&self, url: Url, body: &B) -> Result<CachedResponse> {
    debug_assert_eq!(
      classify(&Method::POST, &url, &self.origin, &self.api_prefix),
      FetchPolicy::Bypass
    );
    self.fetch(Method::POST, url, Some(body)).await
  }

  /// Network preferred; the freshest response wins and refreshes the cache.
  /// A transport failure falls back to the last cached response.
  async fn network_first(&self, url: Url) -> Result<CachedResponse> {
    match self.fetch(Method::GET, url.clone(), None::<&()>).await {
      Ok(response) => {
        self
          .storage
          .put(RUNTIME_NAMESPACE, "GET", url.as_str(), &response)?;
        Ok(response)
      }
      Err(err) => match self.storage.lookup("GET", url.as_str())? {
        Some(cached) => {
          warn!(url = %url, "network unreachable, serving cached response");
          Ok(cached)
        }
        None => Err(err),
      },
    }
  }

  /// Cached copy wins without touching the network; a miss is fetched once
  /// and remembered.
  async fn cache_first(&self, url: Url) -> Result<CachedResponse> {
    if let Some(cached) = self.storage.lookup("GET", url.as_str())? {
      return Ok(cached);
    }

    let response = self.fetch(Method::GET, url.clone(), None::<&()>).await?;
    self
      .storage
      .put(RUNTIME_NAMESPACE, "GET", url.as_str(), &response)?;
    Ok(response)
  }

  /// Raw network fetch. An HTTP error status is still a response and is
  /// returned (and cached) as such; only transport failures are errors.
  async fn fetch<B: Serialize>(
    &self,
    method: Method,
    url: Url,
    body: Option<&B>,
  ) -> Result<CachedResponse> {
    let mut request = self.http.request(method, url.clone());
    if let Some(body) = body {
      request = request.json(body);
    }

    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", url, e))?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.to_string(), v.to_string()))
      })
      .collect();
    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read response from {}: {}", url, e))?
      .to_vec();

    Ok(CachedResponse {
      status,
      headers,
      body,
      fetched_at: None,
    })
  }
}

impl<S: CacheStorage> Clone for RequestProxy<S> {
  fn clone(&self) -> Self {
    Self {
      http: self.http.clone(),
      storage: Arc::clone(&self.storage),
      base: self.base.clone(),
      origin: self.origin.clone(),
      api_prefix: self.api_prefix.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteCacheStorage;

  fn response(body: &str) -> CachedResponse {
    CachedResponse {
      status: 200,
      headers: vec![("content-type".to_string(), "application/json".to_string())],
      body: body.as_bytes().to_vec(),
      fetched_at: None,
    }
  }

  /// Proxy aimed at port 9 (discard): every network attempt fails fast, so
  /// only the cache tiers can answer.
  fn offline_proxy<F>(seed: F) -> RequestProxy<SqliteCacheStorage>
  where
    F: FnOnce(&SqliteCacheStorage),
  {
    let storage = SqliteCacheStorage::open_in_memory(24, 16).unwrap();
    seed(&storage);
    RequestProxy::new("http://localhost:9", "/api", storage).unwrap()
  }

  #[tokio::test]
  async fn test_network_first_falls_back_to_cached_response() {
    let proxy = offline_proxy(|storage| {
      storage
        .put(
          RUNTIME_NAMESPACE,
          "GET",
          "http://localhost:9/api/transaction",
          &response(r#"[{"name":"rent","value":-900,"date":"2024-01-01T00:00:00Z"}]"#),
        )
        .unwrap();
    });

    let url = proxy.url("/api/transaction").unwrap();
    let hit = proxy.get(url).await.unwrap();
    assert_eq!(hit.status, 200);
    assert!(hit.body.starts_with(b"[{\"name\":\"rent\""));
  }

  #[tokio::test]
  async fn test_network_first_fallback_is_per_exact_url() {
    let proxy = offline_proxy(|storage| {
      storage
        .put(RUNTIME_NAMESPACE, "GET", "http://localhost:9/api/transaction", &response("[]"))
        .unwrap();
    });

    // A different API URL has no cached response: the failure propagates
    let url = proxy.url("/api/transaction/bulk").unwrap();
    assert!(proxy.get(url).await.is_err());
  }

  #[tokio::test]
  async fn test_network_first_without_cache_propagates_failure() {
    let proxy = offline_proxy(|_| {});
    let url = proxy.url("/api/transaction").unwrap();
    assert!(proxy.get(url).await.is_err());
  }

  #[tokio::test]
  async fn test_cache_first_serves_hit_without_network() {
    let proxy = offline_proxy(|storage| {
      storage
        .put_batch(
          STATIC_NAMESPACE,
          &[("http://localhost:9/index.html".to_string(), response("<html>"))],
        )
        .unwrap();
    });

    let url = proxy.url("/index.html").unwrap();
    let hit = proxy.get(url).await.unwrap();
    assert_eq!(hit.body, b"<html>");
  }

  #[tokio::test]
  async fn test_cache_first_miss_goes_to_network() {
    let proxy = offline_proxy(|_| {});
    let url = proxy.url("/styles.css").unwrap();
    assert!(proxy.get(url).await.is_err());
  }
}
