//! Request-caching proxy for all outbound HTTP traffic.
//!
//! Every request the application makes goes through [`RequestProxy`], which
//! resolves it via one of three policies:
//! - bypass: non-GET or cross-origin requests hit the network untouched
//! - network-first: API requests prefer the network and fall back to the
//!   most recent cached response when offline
//! - cache-first: static shell requests are served from cache when present
//!
//! Responses live in a namespaced SQLite store: a versioned static namespace
//! populated once at install, and a runtime namespace with TTL and capacity
//! eviction.

mod policy;
mod proxy;
mod storage;

pub use proxy::RequestProxy;
pub use storage::{CacheStorage, CachedResponse, SqliteCacheStorage};
