use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CachePolicy, Strategy};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub backend: BackendConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub offline: OfflineConfig,
  #[serde(default)]
  pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Base URL of the hosted backend, e.g. https://project.supabase.co
  pub url: String,
  /// Per-request timeout. Unset means requests may hang indefinitely.
  pub request_timeout_secs: Option<u64>,
}

/// What happens to queued actions after a sync pass.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
  /// Clear the whole queue after every pass, failed items included
  #[default]
  ClearAll,
  /// Delete only items that succeeded or were skipped
  RetainFailed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  #[serde(default)]
  pub policy: SyncPolicy,
  /// Delay before the fallback sync when background sync registration fails
  #[serde(default = "default_fallback_delay_ms")]
  pub fallback_delay_ms: u64,
  /// Backend paths refreshed on periodic sync
  #[serde(default = "default_periodic_endpoints")]
  pub periodic_endpoints: Vec<String>,
}

fn default_fallback_delay_ms() -> u64 {
  1000
}

fn default_periodic_endpoints() -> Vec<String> {
  vec![
    "/rest/v1/opportunities?select=*&status=eq.published&order=created_at.desc&limit=10".to_string(),
    "/rest/v1/notifications?select=*&order=created_at.desc&limit=20".to_string(),
  ]
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      policy: SyncPolicy::default(),
      fallback_delay_ms: default_fallback_delay_ms(),
      periodic_endpoints: default_periodic_endpoints(),
    }
  }
}

impl SyncConfig {
  pub fn fallback_delay(&self) -> Duration {
    Duration::from_millis(self.fallback_delay_ms)
  }
}

/// Per-bucket overrides of the built-in cache policy table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  #[serde(default)]
  pub buckets: BTreeMap<String, BucketOverride>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketOverride {
  pub strategy: Option<Strategy>,
  pub max_entries: Option<usize>,
  pub max_age_seconds: Option<u64>,
  pub acceptable_statuses: Option<Vec<u16>>,
}

impl BucketOverride {
  pub fn apply(&self, policy: &mut CachePolicy) {
    if let Some(strategy) = self.strategy {
      policy.strategy = strategy;
    }
    if let Some(max_entries) = self.max_entries {
      policy.max_entries = max_entries;
    }
    if let Some(secs) = self.max_age_seconds {
      policy.max_age = Duration::from_secs(secs);
    }
    if let Some(statuses) = &self.acceptable_statuses {
      policy.acceptable_statuses = statuses.iter().copied().collect();
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfflineConfig {
  /// Origin the app shell is served from; fallback paths resolve against it
  #[serde(default = "default_app_origin")]
  pub app_origin: String,
  #[serde(default = "default_offline_page")]
  pub page: String,
  #[serde(default = "default_placeholder_image")]
  pub placeholder_image: String,
}

fn default_app_origin() -> String {
  "http://localhost:5173".to_string()
}

fn default_offline_page() -> String {
  "/offline.html".to_string()
}

fn default_placeholder_image() -> String {
  "/placeholder.svg".to_string()
}

impl Default for OfflineConfig {
  fn default() -> Self {
    Self {
      app_origin: default_app_origin(),
      page: default_offline_page(),
      placeholder_image: default_placeholder_image(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Database file (default: $XDG_DATA_HOME/abathwa/worker.db)
  pub path: Option<PathBuf>,
  /// Log directory (default: $XDG_DATA_HOME/abathwa/logs)
  pub log_dir: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./abathwa.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/abathwa/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/abathwa/config.yaml\n\
                 with at least a `backend.url` entry."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("abathwa.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("abathwa").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    url::Url::parse(&config.backend.url)
      .map_err(|e| eyre!("Invalid backend url {}: {}", config.backend.url, e))?;
    Ok(config)
  }

  /// Get the backend API key from environment variables.
  ///
  /// Checks ABATHWA_API_KEY first, then SUPABASE_ANON_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("ABATHWA_API_KEY")
      .or_else(|_| std::env::var("SUPABASE_ANON_KEY"))
      .map_err(|_| {
        eyre!("Backend API key not found. Set ABATHWA_API_KEY or SUPABASE_ANON_KEY environment variable.")
      })
  }

  /// Directory holding the database and logs.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("abathwa"))
  }

  pub fn database_path(&self) -> Result<PathBuf> {
    match &self.storage.path {
      Some(p) => Ok(p.clone()),
      None => Ok(Self::data_dir()?.join("worker.db")),
    }
  }

  pub fn log_dir(&self) -> Result<PathBuf> {
    match &self.storage.log_dir {
      Some(p) => Ok(p.clone()),
      None => Ok(Self::data_dir()?.join("logs")),
    }
  }
}
