//! Response caching for outbound requests.
//!
//! This module routes each request to a named bucket and applies that
//! bucket's strategy:
//! - network-first for backend API calls, falling back to cache offline
//! - cache-first for images and web fonts
//! - stale-while-revalidate for stylesheets
//!
//! Buckets bound their entry count (oldest evicted first) and entry age
//! (expired entries are misses). Failed navigations and image loads are
//! answered from a pre-cached offline page and placeholder image.

mod layer;
mod network;
mod policy;
mod router;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use network::HttpFetcher;
pub use policy::{CachePolicy, Strategy};
pub use router::CacheRouter;
pub use storage::{ResponseStorage, SqliteResponseStorage};
pub use traits::{CacheResult, CacheSource, Destination, Request, RequestMode, Response};

#[cfg(test)]
pub use network::Fetcher;
#[cfg(test)]
pub use storage::MemoryResponseStorage;
