//! Request routing onto cache buckets, plus offline fallbacks.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use url::Url;

use super::layer::CacheLayer;
use super::policy::{buckets, CachePolicy};
use super::storage::StoredResponse;
use super::traits::{CacheResult, Destination, Request, Response};
use crate::config::Config;

const GOOGLE_FONTS_ORIGIN: &str = "https://fonts.gstatic.com";

/// Predicate selecting requests for a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMatcher {
  /// Serialized origin equality, e.g. `https://fonts.gstatic.com`
  Origin(String),
  Destination(Destination),
}

impl RouteMatcher {
  pub fn matches(&self, request: &Request) -> bool {
    match self {
      RouteMatcher::Origin(origin) => request.origin() == *origin,
      RouteMatcher::Destination(destination) => request.destination == *destination,
    }
  }
}

#[derive(Debug, Clone)]
pub struct Route {
  pub matcher: RouteMatcher,
  pub bucket: String,
}

/// Static resources served when the network is unavailable.
#[derive(Debug, Clone)]
pub struct OfflineFallbacks {
  pub page: Url,
  pub image: Url,
}

impl OfflineFallbacks {
  pub fn from_config(config: &Config) -> Result<Self> {
    let origin = Url::parse(&config.offline.app_origin)
      .map_err(|e| eyre!("Invalid app origin {}: {}", config.offline.app_origin, e))?;
    let resolve = |path: &str| {
      origin
        .join(path)
        .map_err(|e| eyre!("Invalid offline fallback path {}: {}", path, e))
    };
    Ok(Self {
      page: resolve(&config.offline.page)?,
      image: resolve(&config.offline.placeholder_image)?,
    })
  }
}

/// Applies the first matching route's bucket strategy to each request.
pub struct CacheRouter {
  routes: Vec<Route>,
  policies: HashMap<String, CachePolicy>,
  layer: CacheLayer,
  fallbacks: OfflineFallbacks,
}

impl CacheRouter {
  pub fn new(layer: CacheLayer, fallbacks: OfflineFallbacks) -> Self {
    Self {
      routes: Vec::new(),
      policies: HashMap::new(),
      layer,
      fallbacks,
    }
  }

  /// Append a route. Routes are tried in insertion order.
  pub fn with_route(mut self, matcher: RouteMatcher, bucket: &str, policy: CachePolicy) -> Self {
    self.routes.push(Route {
      matcher,
      bucket: bucket.to_string(),
    });
    self.policies.insert(bucket.to_string(), policy);
    self
  }

  /// Build the default route table, applying bucket overrides from config.
  pub fn from_config(config: &Config, backend: &Url, layer: CacheLayer) -> Result<Self> {
    let fallbacks = OfflineFallbacks::from_config(config)?;
    let backend_origin = backend.origin().ascii_serialization();

    let table = [
      (RouteMatcher::Origin(backend_origin), buckets::API, CachePolicy::api()),
      (
        RouteMatcher::Origin(GOOGLE_FONTS_ORIGIN.to_string()),
        buckets::WEBFONTS,
        CachePolicy::webfonts(),
      ),
      (
        RouteMatcher::Destination(Destination::Image),
        buckets::IMAGES,
        CachePolicy::images(),
      ),
      (
        RouteMatcher::Destination(Destination::Style),
        buckets::STYLESHEETS,
        CachePolicy::stylesheets(),
      ),
    ];

    for name in config.cache.buckets.keys() {
      if !table.iter().any(|(_, bucket, _)| *bucket == name.as_str()) {
        warn!(bucket = %name, "Ignoring override for unknown cache bucket");
      }
    }

    let mut router = Self::new(layer, fallbacks);
    for (matcher, bucket, mut policy) in table {
      if let Some(overrides) = config.cache.buckets.get(bucket) {
        overrides.apply(&mut policy);
      }
      router = router.with_route(matcher, bucket, policy);
    }

    Ok(router)
  }

  pub fn route_for(&self, request: &Request) -> Option<&Route> {
    self.routes.iter().find(|route| route.matcher.matches(request))
  }

  #[cfg(test)]
  pub fn policy(&self, bucket: &str) -> Option<&CachePolicy> {
    self.policies.get(bucket)
  }

  /// Pre-cache the offline page and placeholder image.
  pub async fn install(&self) -> Result<()> {
    for url in [&self.fallbacks.page, &self.fallbacks.image] {
      let request = Request::get(url.clone());
      let response = self.layer.fetcher().fetch(&request).await?;
      if !(200..300).contains(&response.status) {
        return Err(eyre!(
          "Failed to pre-cache {}: status {}",
          url,
          response.status
        ));
      }

      let entry = StoredResponse {
        url: url.to_string(),
        response,
        cached_at: chrono::Utc::now(),
      };
      self
        .layer
        .storage()
        .put(buckets::OFFLINE_FALLBACKS, &request.cache_key(), &entry, None)?;
      info!(%url, "Pre-cached offline fallback");
    }
    Ok(())
  }

  /// Serve a request through its route, or straight from the network when
  /// no route matches. Failed navigations and image loads get a fallback.
  ///
  /// Only GET requests are cached. Anything else always goes to the network
  /// and its failure is returned as is.
  pub async fn handle(&self, request: &Request) -> Result<CacheResult<Response>> {
    if !request.method.eq_ignore_ascii_case("GET") {
      debug!(url = %request.url, method = %request.method, "Bypassing cache");
      return self
        .layer
        .fetcher()
        .fetch(request)
        .await
        .map(CacheResult::from_network);
    }

    let result = match self.route_for(request) {
      Some(route) => {
        let policy = self
          .policies
          .get(&route.bucket)
          .ok_or_else(|| eyre!("No policy for cache bucket {}", route.bucket))?;
        debug!(url = %request.url, bucket = %route.bucket, strategy = ?policy.strategy, "Routing request");
        self.layer.handle(&route.bucket, policy, request).await
      }
      None => self
        .layer
        .fetcher()
        .fetch(request)
        .await
        .map(CacheResult::from_network),
    };

    match result {
      Ok(result) => Ok(result),
      Err(e) => match self.fallback_for(request) {
        Some(fallback) => {
          debug!(url = %request.url, "Serving offline fallback: {:#}", e);
          Ok(fallback)
        }
        None => Err(e),
      },
    }
  }

  fn fallback_for(&self, request: &Request) -> Option<CacheResult<Response>> {
    let url = if request.is_navigation() {
      &self.fallbacks.page
    } else if request.destination == Destination::Image {
      &self.fallbacks.image
    } else {
      return None;
    };

    let key = Request::get(url.clone()).cache_key();
    match self.layer.storage().get(buckets::OFFLINE_FALLBACKS, &key) {
      Ok(Some(entry)) => Some(CacheResult::fallback(entry.response, entry.cached_at)),
      Ok(None) => {
        warn!(%url, "Offline fallback missing from cache");
        None
      }
      Err(e) => {
        warn!(%url, "Failed to read offline fallback: {:#}", e);
        None
      }
    }
  }
}
