//! The offline worker: a single event loop handling lifecycle events from
//! the host runtime one at a time.

mod clients;
mod event;
mod messages;
mod platform;

pub use clients::ClientHub;
pub use event::{pump_host_events, HostOutput, WorkerEvent};
pub use messages::{ClientMessage, MessageReply, PushNotification, WorkerMessage};
pub use platform::{HeadlessPlatform, Platform};

use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheRouter, Request};
use crate::queue::QueueStore;
use crate::sync::SyncOrchestrator;

/// Tag registered for replaying the offline queue
pub const SYNC_TAG: &str = "background-sync";
/// Tag for the periodic content refresh
pub const PERIODIC_SYNC_TAG: &str = "content-sync";

pub struct ServiceWorker {
  queue: Arc<dyn QueueStore>,
  orchestrator: SyncOrchestrator,
  router: CacheRouter,
  platform: Arc<dyn Platform>,
  /// Requests refreshed on periodic sync
  periodic_requests: Vec<Request>,
  fallback_delay: Duration,
  events_tx: mpsc::WeakUnboundedSender<WorkerEvent>,
  events_rx: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl ServiceWorker {
  /// Create a worker and the sender the host uses to deliver events.
  ///
  /// The loop stops once every sender returned here has been dropped.
  pub fn new(
    queue: Arc<dyn QueueStore>,
    orchestrator: SyncOrchestrator,
    router: CacheRouter,
    platform: Arc<dyn Platform>,
  ) -> (Self, mpsc::UnboundedSender<WorkerEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = Self {
      queue,
      orchestrator,
      router,
      platform,
      periodic_requests: Vec::new(),
      fallback_delay: Duration::from_secs(1),
      events_tx: tx.downgrade(),
      events_rx: rx,
    };
    (worker, tx)
  }

  pub fn with_periodic_requests(mut self, requests: Vec<Request>) -> Self {
    self.periodic_requests = requests;
    self
  }

  pub fn with_fallback_delay(mut self, delay: Duration) -> Self {
    self.fallback_delay = delay;
    self
  }

  /// Handle events until the host hangs up.
  pub async fn run(mut self) {
    info!("Worker started");
    while let Some(event) = self.events_rx.recv().await {
      self.handle(event).await;
    }
    info!("Worker stopped");
  }

  async fn handle(&self, event: WorkerEvent) {
    match event {
      WorkerEvent::Install => self.on_install().await,
      WorkerEvent::Fetch { request, reply } => {
        let outcome = self
          .router
          .handle(&request)
          .await
          .map_err(|e| format!("{:#}", e));
        if reply.send(outcome).is_err() {
          debug!(url = %request.url, "Fetch requester went away");
        }
      }
      WorkerEvent::Sync { tag } => self.on_sync(&tag).await,
      WorkerEvent::PeriodicSync { tag } => self.on_periodic_sync(&tag).await,
      WorkerEvent::Push { payload } => self.on_push(payload.as_deref()),
      WorkerEvent::NotificationClick { action, data } => {
        self.on_notification_click(action.as_deref(), &data)
      }
      WorkerEvent::Message { message, reply } => {
        let success = self.on_message(message);
        let _ = reply.send(MessageReply { success });
      }
    }
  }

  async fn on_install(&self) {
    match self.router.install().await {
      Ok(()) => info!("Offline fallbacks cached"),
      Err(e) => error!("Failed to cache offline fallbacks: {:#}", e),
    }
  }

  async fn on_sync(&self, tag: &str) {
    if tag != SYNC_TAG {
      debug!(tag, "Ignoring sync event with unknown tag");
      return;
    }
    self.orchestrator.run().await;
  }

  async fn on_periodic_sync(&self, tag: &str) {
    if tag != PERIODIC_SYNC_TAG {
      debug!(tag, "Ignoring periodic sync with unknown tag");
      return;
    }

    let refreshes = self
      .periodic_requests
      .iter()
      .map(|request| async move { (request, self.router.handle(request).await) });

    for (request, outcome) in join_all(refreshes).await {
      match outcome {
        Ok(result) => debug!(url = %request.url, source = ?result.source, "Refreshed"),
        Err(e) => warn!(url = %request.url, "Periodic refresh failed: {:#}", e),
      }
    }
  }

  fn on_push(&self, payload: Option<&str>) {
    let notification = PushNotification::from_payload(payload);
    if let Err(e) = self.platform.show_notification(&notification) {
      error!("Failed to show notification: {:#}", e);
    }
  }

  fn on_notification_click(&self, action: Option<&str>, data: &Value) {
    if action == Some("dismiss") {
      return;
    }
    let url = data.get("url").and_then(Value::as_str).unwrap_or("/");
    if let Err(e) = self.platform.open_window(url) {
      error!(url, "Failed to open window: {:#}", e);
    }
  }

  /// Persist a queued action and request a background sync. Returns
  /// whether the action was stored.
  fn on_message(&self, message: Value) -> bool {
    let message: WorkerMessage = match serde_json::from_value(message) {
      Ok(message) => message,
      Err(e) => {
        warn!("Ignoring unrecognised client message: {}", e);
        return false;
      }
    };

    match message {
      WorkerMessage::QueueOfflineAction { action_type, data } => {
        match self.queue.enqueue(&action_type, &data) {
          Ok(id) => info!(id, %action_type, "Queued offline action"),
          Err(e) => {
            error!(%action_type, "Failed to queue offline action: {:#}", e);
            return false;
          }
        }
        self.request_sync();
        true
      }
    }
  }

  /// Register background sync, or schedule a delayed sync event if the
  /// platform cannot.
  fn request_sync(&self) {
    let Err(e) = self.platform.register_sync(SYNC_TAG) else {
      return;
    };

    debug!(
      delay_ms = self.fallback_delay.as_millis() as u64,
      "Sync registration failed, scheduling fallback: {:#}", e
    );
    let events = self.events_tx.clone();
    let delay = self.fallback_delay;
    tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let Some(events) = events.upgrade() else {
        warn!("Worker stopped before fallback sync");
        return;
      };
      let _ = events.send(WorkerEvent::Sync {
        tag: SYNC_TAG.to_string(),
      });
    });
  }
}
