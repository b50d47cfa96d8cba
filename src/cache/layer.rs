//! Cache layer that applies a bucket's strategy around network fetching.

use chrono::Utc;
use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use super::network::Fetcher;
use super::policy::{CachePolicy, Strategy};
use super::storage::{ResponseStorage, StoredResponse};
use super::traits::{CacheResult, Request, Response};

/// Cache layer that manages caching logic and network fetching.
///
/// Storage failures never fail a request: they are logged and treated as a
/// cache miss (on read) or a skipped write.
#[derive(Clone)]
pub struct CacheLayer {
  storage: Arc<dyn ResponseStorage>,
  fetcher: Arc<dyn Fetcher>,
}

impl CacheLayer {
  pub fn new(storage: Arc<dyn ResponseStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
    Self { storage, fetcher }
  }

  pub fn storage(&self) -> &Arc<dyn ResponseStorage> {
    &self.storage
  }

  pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
    &self.fetcher
  }

  /// Serve `request` using the strategy of `policy`.
  pub async fn handle(
    &self,
    bucket: &str,
    policy: &CachePolicy,
    request: &Request,
  ) -> Result<CacheResult<Response>> {
    match policy.strategy {
      Strategy::NetworkFirst => self.network_first(bucket, policy, request).await,
      Strategy::CacheFirst => self.cache_first(bucket, policy, request).await,
      Strategy::StaleWhileRevalidate => self.stale_while_revalidate(bucket, policy, request).await,
    }
  }

  /// Network-first strategy.
  ///
  /// 1. Fetch from network and cache the response
  /// 2. On network failure, return the cached entry (offline mode)
  /// 3. With nothing cached, the network error propagates
  pub async fn network_first(
    &self,
    bucket: &str,
    policy: &CachePolicy,
    request: &Request,
  ) -> Result<CacheResult<Response>> {
    match self.fetcher.fetch(request).await {
      Ok(response) => {
        store_response(self.storage.as_ref(), bucket, policy, request, &response);
        Ok(CacheResult::from_network(response))
      }
      Err(e) => match self.lookup(bucket, policy, request) {
        Some(cached) => {
          debug!(url = %request.url, "Network failed, serving cached response");
          Ok(CacheResult::offline(cached.response, cached.cached_at))
        }
        None => Err(e),
      },
    }
  }

  /// Cache-first strategy.
  ///
  /// 1. Fresh cached entry: return it without touching the network
  /// 2. Otherwise fetch, cache and return
  pub async fn cache_first(
    &self,
    bucket: &str,
    policy: &CachePolicy,
    request: &Request,
  ) -> Result<CacheResult<Response>> {
    if let Some(cached) = self.lookup(bucket, policy, request) {
      return Ok(CacheResult::from_cache(
        cached.response,
        cached.cached_at,
        false,
      ));
    }

    let response = self.fetcher.fetch(request).await?;
    store_response(self.storage.as_ref(), bucket, policy, request, &response);
    Ok(CacheResult::from_network(response))
  }

  /// Stale-while-revalidate strategy.
  ///
  /// A cached entry is returned at once while a background task refreshes
  /// it. With nothing cached this behaves like a network fetch.
  pub async fn stale_while_revalidate(
    &self,
    bucket: &str,
    policy: &CachePolicy,
    request: &Request,
  ) -> Result<CacheResult<Response>> {
    if let Some(cached) = self.lookup(bucket, policy, request) {
      self.spawn_revalidation(bucket, policy, request);
      return Ok(CacheResult::from_cache(
        cached.response,
        cached.cached_at,
        true,
      ));
    }

    let response = self.fetcher.fetch(request).await?;
    store_response(self.storage.as_ref(), bucket, policy, request, &response);
    Ok(CacheResult::from_network(response))
  }

  fn spawn_revalidation(&self, bucket: &str, policy: &CachePolicy, request: &Request) {
    let storage = Arc::clone(&self.storage);
    let fetcher = Arc::clone(&self.fetcher);
    let bucket = bucket.to_string();
    let policy = policy.clone();
    let request = request.clone();

    tokio::spawn(async move {
      match fetcher.fetch(&request).await {
        Ok(response) => store_response(storage.as_ref(), &bucket, &policy, &request, &response),
        Err(e) => debug!(url = %request.url, "Background revalidation failed: {:#}", e),
      }
    });
  }

  /// Fresh cached entry for `request`. Expired entries are deleted and
  /// reported as a miss.
  fn lookup(
    &self,
    bucket: &str,
    policy: &CachePolicy,
    request: &Request,
  ) -> Option<StoredResponse> {
    let key = request.cache_key();
    let cached = match self.storage.get(bucket, &key) {
      Ok(cached) => cached?,
      Err(e) => {
        warn!(bucket, url = %request.url, "Cache read failed: {:#}", e);
        return None;
      }
    };

    if policy.is_expired(cached.cached_at, Utc::now()) {
      debug!(bucket, url = %request.url, "Cached response expired");
      if let Err(e) = self.storage.delete(bucket, &key) {
        warn!(bucket, "Failed to delete expired response: {:#}", e);
      }
      return None;
    }

    Some(cached)
  }
}

/// Write a response into its bucket if the policy accepts its status,
/// purging expired entries and evicting the oldest beyond `max_entries`.
fn store_response(
  storage: &dyn ResponseStorage,
  bucket: &str,
  policy: &CachePolicy,
  request: &Request,
  response: &Response,
) {
  if !policy.is_cacheable(response.status) {
    debug!(bucket, status = response.status, url = %request.url, "Response not cacheable");
    return;
  }

  let now = Utc::now();
  if let Some(cutoff) = policy.cutoff(now) {
    if let Err(e) = storage.purge_before(bucket, cutoff) {
      warn!(bucket, "Failed to purge expired responses: {:#}", e);
    }
  }

  let entry = StoredResponse {
    url: request.url.to_string(),
    response: response.clone(),
    cached_at: now,
  };
  match storage.put(bucket, &request.cache_key(), &entry, Some(policy.max_entries)) {
    Ok(0) => {}
    Ok(evicted) => debug!(bucket, evicted, "Evicted oldest cached responses"),
    Err(e) => warn!(bucket, url = %request.url, "Failed to cache response: {:#}", e),
  }
}
