//! Message protocol between UI contexts and the worker.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Requests sent by a UI context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
  QueueOfflineAction {
    #[serde(rename = "actionType")]
    action_type: String,
    #[serde(default)]
    data: Value,
  },
}

/// Acknowledgement for a [`WorkerMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReply {
  pub success: bool,
}

/// Broadcasts sent to every connected UI context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
  SyncComplete {
    #[serde(rename = "processedItems")]
    processed_items: usize,
  },
}

/// Notification shown for a push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushNotification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  /// Opened when the notification is clicked
  pub url: String,
}

/// Push payload as sent by the server; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct PushPayload {
  title: Option<String>,
  body: Option<String>,
  icon: Option<String>,
  url: Option<String>,
}

impl PushNotification {
  pub const DEFAULT_TITLE: &'static str = "Abathwa Capital";
  const DEFAULT_BODY: &'static str = "You have a new notification";
  const ICON: &'static str = "/icon-192x192.png";
  const BADGE: &'static str = "/icon-72x72.png";

  /// Build from a raw push payload. Missing or unparseable payloads fall
  /// back to the defaults.
  pub fn from_payload(payload: Option<&str>) -> Self {
    let payload: PushPayload = payload
      .and_then(|raw| serde_json::from_str(raw).ok())
      .unwrap_or_default();

    Self {
      title: payload
        .title
        .unwrap_or_else(|| Self::DEFAULT_TITLE.to_string()),
      body: payload.body.unwrap_or_else(|| Self::DEFAULT_BODY.to_string()),
      icon: payload.icon.unwrap_or_else(|| Self::ICON.to_string()),
      badge: Self::BADGE.to_string(),
      url: payload.url.unwrap_or_else(|| "/".to_string()),
    }
  }
}
