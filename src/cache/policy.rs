//! Per-bucket caching policy and the built-in bucket names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Names of the built-in buckets.
pub mod buckets {
  pub const API: &str = "api-cache";
  pub const WEBFONTS: &str = "webfonts";
  pub const IMAGES: &str = "images";
  pub const STYLESHEETS: &str = "stylesheets";
  /// Pre-cached offline page and placeholder image; never evicted
  pub const OFFLINE_FALLBACKS: &str = "offline-fallbacks";
}

const DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
  NetworkFirst,
  CacheFirst,
  StaleWhileRevalidate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
  pub strategy: Strategy,
  pub max_entries: usize,
  pub max_age: Duration,
  /// Statuses worth storing; 0 stands for opaque cross-origin responses
  pub acceptable_statuses: BTreeSet<u16>,
}

impl CachePolicy {
  pub fn new(strategy: Strategy, max_entries: usize, max_age: Duration) -> Self {
    Self {
      strategy,
      max_entries,
      max_age,
      acceptable_statuses: [0, 200].into_iter().collect(),
    }
  }

  pub fn api() -> Self {
    Self::new(Strategy::NetworkFirst, 100, Duration::from_secs(DAY))
  }

  pub fn webfonts() -> Self {
    Self::new(Strategy::CacheFirst, 30, Duration::from_secs(365 * DAY))
  }

  pub fn images() -> Self {
    Self::new(Strategy::CacheFirst, 100, Duration::from_secs(30 * DAY))
  }

  pub fn stylesheets() -> Self {
    Self::new(Strategy::StaleWhileRevalidate, 60, Duration::from_secs(7 * DAY))
  }

  pub fn is_cacheable(&self, status: u16) -> bool {
    self.acceptable_statuses.contains(&status)
  }

  pub fn is_expired(&self, cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match chrono::Duration::from_std(self.max_age) {
      Ok(max_age) => now - cached_at >= max_age,
      // Larger than chrono can represent: never expires
      Err(_) => false,
    }
  }

  /// Oldest `cached_at` that is still fresh at `now`.
  pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(self.max_age)
      .ok()
      .and_then(|max_age| now.checked_sub_signed(max_age))
  }
}
