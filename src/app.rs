use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::backend::{BackendClient, BackendProcessor};
use crate::cache::{
  CacheLayer, CacheRouter, HttpFetcher, Request, ResponseStorage, SqliteResponseStorage,
};
use crate::config::Config;
use crate::db::kv::SqliteKv;
use crate::db::Database;
use crate::notifications::NotificationStore;
use crate::queue::{QueueStore, QueuedAction, SqliteQueueStore};
use crate::sync::{SyncOrchestrator, SyncReport};
use crate::worker::{pump_host_events, ClientHub, HeadlessPlatform, HostOutput, ServiceWorker};

/// Wires configuration, storage and backend access together
pub struct App {
  config: Config,
  db: Arc<Database>,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let path = config.database_path()?;
    let db = Arc::new(Database::open(&path)?);
    info!(path = %path.display(), "Opened worker database");
    Ok(Self { config, db })
  }

  fn queue(&self) -> Arc<SqliteQueueStore> {
    Arc::new(SqliteQueueStore::new(Arc::clone(&self.db)))
  }

  pub fn notifications(&self) -> NotificationStore {
    NotificationStore::new(Arc::new(SqliteKv::new(Arc::clone(&self.db))))
  }

  fn backend(&self) -> Result<BackendClient> {
    let api_key = Config::get_api_key()?;
    BackendClient::new(&self.config.backend, &api_key)
  }

  fn orchestrator(&self, backend: &BackendClient, clients: ClientHub) -> SyncOrchestrator {
    SyncOrchestrator::new(
      self.queue(),
      Arc::new(BackendProcessor::new(backend.clone())),
      self.config.sync.policy,
      clients,
    )
  }

  fn router(&self, backend: &BackendClient) -> Result<CacheRouter> {
    let timeout = self
      .config
      .backend
      .request_timeout_secs
      .map(std::time::Duration::from_secs);
    let layer = CacheLayer::new(
      Arc::new(SqliteResponseStorage::new(Arc::clone(&self.db))),
      Arc::new(HttpFetcher::new(timeout)?),
    );
    CacheRouter::from_config(&self.config, backend.base_url(), layer)
  }

  fn periodic_requests(&self, backend: &BackendClient) -> Result<Vec<Request>> {
    self
      .config
      .sync
      .periodic_endpoints
      .iter()
      .map(|path| Ok(Request::get(backend.url(path)?).with_headers(backend.auth_headers())))
      .collect()
  }

  /// Queue an action for the next sync pass
  pub fn enqueue(&self, action_type: &str, data: &Value) -> Result<i64> {
    self.queue().enqueue(action_type, data)
  }

  pub fn pending(&self) -> Result<Vec<QueuedAction>> {
    self.queue().drain()
  }

  pub fn pending_count(&self) -> Result<usize> {
    self.queue().len()
  }

  /// Urls cached in `bucket`, oldest first
  pub fn cached_urls(&self, bucket: &str) -> Result<Vec<String>> {
    SqliteResponseStorage::new(Arc::clone(&self.db)).urls(bucket)
  }

  /// Run one sync pass immediately
  pub async fn sync(&self) -> Result<SyncReport> {
    let backend = self.backend()?;
    Ok(self.orchestrator(&backend, ClientHub::new()).run().await)
  }

  /// Host the worker over stdio: JSON events in, JSON replies and client
  /// broadcasts out, one per line. Returns when stdin closes.
  pub async fn run_worker(&self) -> Result<()> {
    let backend = self.backend()?;

    let clients = ClientHub::new();
    let mut client_rx = clients.subscribe();
    let orchestrator = self.orchestrator(&backend, clients);

    let mut states = orchestrator.subscribe_state();
    tokio::spawn(async move {
      while states.changed().await.is_ok() {
        let state = *states.borrow_and_update();
        debug!(%state, "Sync state changed");
      }
    });

    let (worker, events) = ServiceWorker::new(
      self.queue(),
      orchestrator,
      self.router(&backend)?,
      Arc::new(HeadlessPlatform),
    );
    let worker = worker
      .with_periodic_requests(self.periodic_requests(&backend)?)
      .with_fallback_delay(self.config.sync.fallback_delay());
    let worker_task = tokio::spawn(worker.run());

    let (output_tx, mut output_rx) = mpsc::unbounded_channel::<HostOutput>();

    let writer = tokio::spawn(async move {
      let mut stdout = tokio::io::stdout();
      while let Some(output) = output_rx.recv().await {
        let mut line = match serde_json::to_string(&output) {
          Ok(line) => line,
          Err(e) => {
            warn!("Failed to encode host output: {}", e);
            continue;
          }
        };
        line.push('\n');
        if let Err(e) = stdout.write_all(line.as_bytes()).await {
          warn!("Failed to write to stdout: {}", e);
          break;
        }
        let _ = stdout.flush().await;
      }
    });

    let forward_tx = output_tx.clone();
    let forwarder = tokio::spawn(async move {
      loop {
        match client_rx.recv().await {
          Ok(message) => {
            let message = serde_json::to_value(&message).unwrap_or(Value::Null);
            if forward_tx.send(HostOutput::ClientMessage { message }).is_err() {
              break;
            }
          }
          Err(broadcast::error::RecvError::Lagged(skipped)) => {
            warn!(skipped, "Client message stream lagged");
          }
          Err(broadcast::error::RecvError::Closed) => break,
        }
      }
    });

    pump_host_events(BufReader::new(tokio::io::stdin()), events, output_tx).await;

    worker_task
      .await
      .map_err(|e| eyre!("Worker task failed: {}", e))?;
    forwarder
      .await
      .map_err(|e| eyre!("Client forwarder failed: {}", e))?;
    writer
      .await
      .map_err(|e| eyre!("Output writer failed: {}", e))?;

    Ok(())
  }
}
