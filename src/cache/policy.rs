//! Per-request policy selection for the caching proxy.

use reqwest::Method;
use url::{Origin, Url};

/// How the proxy resolves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
  /// Straight to the network, no cache involvement
  Bypass,
  /// Network preferred, cached response as offline fallback
  NetworkFirst,
  /// Cached response preferred, network on miss
  CacheFirst,
}

/// Classify a request by shape.
///
/// Non-GET requests and requests to other origins are never cached. Among
/// same-origin GETs, API paths get network-first (fresh data wins, cache is
/// the offline fallback) and everything else — the static shell — gets
/// cache-first.
pub fn classify(method: &Method, url: &Url, origin: &Origin, api_prefix: &str) -> FetchPolicy {
  if *method != Method::GET || url.origin() != *origin {
    return FetchPolicy::Bypass;
  }

  if url.path().contains(api_prefix) {
    return FetchPolicy::NetworkFirst;
  }

  FetchPolicy::CacheFirst
}

#[cfg(test)]
mod tests {
  use super::*;

  fn origin() -> Origin {
    Url::parse("http://localhost:3000").unwrap().origin()
  }

  fn url(path: &str) -> Url {
    Url::parse("http://localhost:3000").unwrap().join(path).unwrap()
  }

  #[test]
  fn test_post_bypasses_cache() {
    let policy = classify(&Method::POST, &url("/api/transaction"), &origin(), "/api");
    assert_eq!(policy, FetchPolicy::Bypass);
  }

  #[test]
  fn test_cross_origin_bypasses_cache() {
    let other = Url::parse("https://cdn.example.com/chart.js").unwrap();
    let policy = classify(&Method::GET, &other, &origin(), "/api");
    assert_eq!(policy, FetchPolicy::Bypass);
  }

  #[test]
  fn test_api_get_is_network_first() {
    let policy = classify(&Method::GET, &url("/api/transaction"), &origin(), "/api");
    assert_eq!(policy, FetchPolicy::NetworkFirst);
  }

  #[test]
  fn test_shell_get_is_cache_first() {
    for path in ["/", "/index.html", "/styles.css", "/icons/icon-192x192.png"] {
      let policy = classify(&Method::GET, &url(path), &origin(), "/api");
      assert_eq!(policy, FetchPolicy::CacheFirst, "path {}", path);
    }
  }

  #[test]
  fn test_same_port_matters_for_origin() {
    let other_port = Url::parse("http://localhost:3001/api/transaction").unwrap();
    let policy = classify(&Method::GET, &other_port, &origin(), "/api");
    assert_eq!(policy, FetchPolicy::Bypass);
  }
}
