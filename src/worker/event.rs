//! Lifecycle events delivered to the worker, and a reader that turns
//! newline-delimited JSON from the host into those events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;
use url::Url;

use super::messages::MessageReply;
use crate::cache::{CacheResult, CacheSource, Destination, Request, RequestMode, Response};

pub type FetchOutcome = Result<CacheResult<Response>, String>;

/// Worker events
#[derive(Debug)]
pub enum WorkerEvent {
  /// Worker installed; pre-cache offline fallbacks
  Install,
  /// Outbound request to route through the cache
  Fetch {
    request: Request,
    reply: oneshot::Sender<FetchOutcome>,
  },
  /// Background sync wake-up
  Sync { tag: String },
  /// Periodic background refresh
  PeriodicSync { tag: String },
  /// Server push with an optional JSON payload
  Push { payload: Option<String> },
  /// User clicked a notification
  NotificationClick { action: Option<String>, data: Value },
  /// Message from a UI context
  Message {
    message: Value,
    reply: oneshot::Sender<MessageReply>,
  },
}

/// Event as written by the host, one JSON object per line.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum HostEvent {
  Install,
  Fetch {
    url: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    destination: Destination,
    #[serde(default)]
    mode: RequestMode,
  },
  Sync {
    #[serde(default = "default_sync_tag")]
    tag: String,
  },
  PeriodicSync {
    #[serde(default = "default_periodic_tag")]
    tag: String,
  },
  Push {
    #[serde(default)]
    payload: Option<Value>,
  },
  NotificationClick {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    data: Value,
  },
  Message {
    message: Value,
  },
}

fn default_sync_tag() -> String {
  super::SYNC_TAG.to_string()
}

fn default_periodic_tag() -> String {
  super::PERIODIC_SYNC_TAG.to_string()
}

/// Line written back to the host.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostOutput {
  FetchResult {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<CacheSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
    /// When the served copy was stored, if it came from the cache
    #[serde(skip_serializing_if = "Option::is_none")]
    cached_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
  },
  MessageReply(MessageReply),
  ClientMessage { message: Value },
  Error { error: String },
}

impl HostOutput {
  pub fn from_fetch(url: &Url, outcome: FetchOutcome) -> Self {
    match outcome {
      Ok(result) => HostOutput::FetchResult {
        url: url.to_string(),
        status: Some(result.data.status),
        source: Some(result.source),
        content_type: result.data.header("content-type").map(str::to_string),
        bytes: Some(result.data.body.len()),
        cached_at: result.cached_at,
        error: None,
      },
      Err(error) => HostOutput::FetchResult {
        url: url.to_string(),
        status: None,
        source: None,
        content_type: None,
        bytes: None,
        cached_at: None,
        error: Some(error),
      },
    }
  }
}

/// Reads host events from `reader` and forwards them to the worker.
///
/// Replies are written to `output` as they arrive. Returns when the reader
/// reaches end of input or the worker has stopped.
pub async fn pump_host_events<R>(
  reader: R,
  events: mpsc::UnboundedSender<WorkerEvent>,
  output: mpsc::UnboundedSender<HostOutput>,
) where
  R: AsyncBufRead + Unpin,
{
  let mut lines = reader.lines();

  loop {
    let line = match lines.next_line().await {
      Ok(Some(line)) => line,
      Ok(None) => break,
      Err(e) => {
        warn!("Failed to read host event: {}", e);
        break;
      }
    };
    if line.trim().is_empty() {
      continue;
    }

    let host_event: HostEvent = match serde_json::from_str(&line) {
      Ok(event) => event,
      Err(e) => {
        let _ = output.send(HostOutput::Error {
          error: format!("Invalid event: {}", e),
        });
        continue;
      }
    };

    let event = match into_worker_event(host_event, &output) {
      Ok(event) => event,
      Err(error) => {
        let _ = output.send(HostOutput::Error { error });
        continue;
      }
    };

    if events.send(event).is_err() {
      break;
    }
  }
}

fn into_worker_event(
  event: HostEvent,
  output: &mpsc::UnboundedSender<HostOutput>,
) -> Result<WorkerEvent, String> {
  let event = match event {
    HostEvent::Install => WorkerEvent::Install,
    HostEvent::Fetch {
      url,
      method,
      destination,
      mode,
    } => {
      let url = Url::parse(&url).map_err(|e| format!("Invalid url {}: {}", url, e))?;
      let mut request = Request::get(url.clone())
        .with_destination(destination)
        .with_mode(mode);
      if let Some(method) = method {
        request.method = method;
      }

      let (reply, rx) = oneshot::channel();
      let output = output.clone();
      tokio::spawn(async move {
        if let Ok(outcome) = rx.await {
          let _ = output.send(HostOutput::from_fetch(&url, outcome));
        }
      });
      WorkerEvent::Fetch { request, reply }
    }
    HostEvent::Sync { tag } => WorkerEvent::Sync { tag },
    HostEvent::PeriodicSync { tag } => WorkerEvent::PeriodicSync { tag },
    HostEvent::Push { payload } => WorkerEvent::Push {
      payload: payload.map(|p| match p {
        Value::String(s) => s,
        other => other.to_string(),
      }),
    },
    HostEvent::NotificationClick { action, data } => WorkerEvent::NotificationClick { action, data },
    HostEvent::Message { message } => {
      let (reply, rx) = oneshot::channel();
      let output = output.clone();
      tokio::spawn(async move {
        if let Ok(reply) = rx.await {
          let _ = output.send(HostOutput::MessageReply(reply));
        }
      });
      WorkerEvent::Message { message, reply }
    }
  };
  Ok(event)
}
