//! Sync orchestrator: drains the durable queue, replays each action in
//! order, cleans up according to the configured policy and tells connected
//! clients the pass is complete.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::backend::{ActionProcessor, ProcessOutcome};
use crate::config::SyncPolicy;
use crate::queue::QueueStore;
use crate::worker::{ClientHub, ClientMessage};

/// Where the orchestrator is in a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
  Idle,
  Draining,
  Processing { index: usize, total: usize },
  Completed,
  PartiallyFailed,
}

impl fmt::Display for SyncState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SyncState::Idle => f.write_str("idle"),
      SyncState::Draining => f.write_str("draining"),
      SyncState::Processing { index, total } => write!(f, "processing {}/{}", index + 1, total),
      SyncState::Completed => f.write_str("completed"),
      SyncState::PartiallyFailed => f.write_str("partially failed"),
    }
  }
}

/// Outcome counts for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
  /// Items read from the queue; this is what clients are told was processed
  pub drained: usize,
  pub succeeded: usize,
  pub skipped: usize,
  pub failed: usize,
  pub failed_ids: Vec<i64>,
}

impl SyncReport {
  fn final_state(&self) -> SyncState {
    if self.failed == 0 {
      SyncState::Completed
    } else {
      SyncState::PartiallyFailed
    }
  }
}

pub struct SyncOrchestrator {
  store: Arc<dyn QueueStore>,
  processor: Arc<dyn ActionProcessor>,
  policy: SyncPolicy,
  clients: ClientHub,
  state: watch::Sender<SyncState>,
}

impl SyncOrchestrator {
  pub fn new(
    store: Arc<dyn QueueStore>,
    processor: Arc<dyn ActionProcessor>,
    policy: SyncPolicy,
    clients: ClientHub,
  ) -> Self {
    let (state, _) = watch::channel(SyncState::Idle);
    Self {
      store,
      processor,
      policy,
      clients,
      state,
    }
  }

  #[cfg(test)]
  pub fn state(&self) -> SyncState {
    *self.state.borrow()
  }

  pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
    self.state.subscribe()
  }

  /// Run one sync pass to completion. Never fails: every error is logged.
  pub async fn run(&self) -> SyncReport {
    self.state.send_replace(SyncState::Draining);

    let actions = match self.store.drain() {
      Ok(actions) => actions,
      Err(e) => {
        error!("Failed to read offline queue: {:#}", e);
        self.state.send_replace(SyncState::Idle);
        return SyncReport::default();
      }
    };

    let total = actions.len();
    let mut report = SyncReport {
      drained: total,
      ..SyncReport::default()
    };
    let mut done_ids = Vec::with_capacity(total);

    for (index, action) in actions.iter().enumerate() {
      self
        .state
        .send_replace(SyncState::Processing { index, total });

      match self.processor.process(action).await {
        Ok(ProcessOutcome::Sent) => {
          report.succeeded += 1;
          done_ids.push(action.id);
        }
        Ok(ProcessOutcome::Skipped) => {
          report.skipped += 1;
          done_ids.push(action.id);
        }
        Err(e) => {
          error!(
            id = action.id,
            action_type = %action.action_type,
            "Failed to sync offline action: {:#}",
            e
          );
          report.failed += 1;
          report.failed_ids.push(action.id);
        }
      }
    }

    self.cleanup(&report, &done_ids);

    self.state.send_replace(report.final_state());
    info!(
      drained = report.drained,
      succeeded = report.succeeded,
      skipped = report.skipped,
      failed = report.failed,
      "Background sync pass finished"
    );

    let delivered = self.clients.post_all(ClientMessage::SyncComplete {
      processed_items: report.drained,
    });
    info!(clients = delivered, "Notified clients of sync completion");

    self.state.send_replace(SyncState::Idle);
    report
  }

  fn cleanup(&self, report: &SyncReport, done_ids: &[i64]) {
    let result = match self.policy {
      SyncPolicy::ClearAll => {
        if report.failed > 0 {
          warn!(
            failed = report.failed,
            "Clearing offline queue; failed actions will not be retried"
          );
        }
        self.store.clear()
      }
      SyncPolicy::RetainFailed => self.store.remove(done_ids),
    };

    if let Err(e) = result {
      error!("Failed to clean up offline queue: {:#}", e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::queue::{MemoryQueueStore, QueuedAction};
  use async_trait::async_trait;
  use color_eyre::{eyre::eyre, Result};
  use serde_json::json;
  use std::sync::Mutex;

  /// Processor that records calls and fails for chosen payload markers.
  #[derive(Default)]
  struct ScriptedProcessor {
    calls: Mutex<Vec<QueuedAction>>,
    fail_markers: Vec<i64>,
  }

  impl ScriptedProcessor {
    fn failing(markers: &[i64]) -> Self {
      Self {
        calls: Mutex::new(Vec::new()),
        fail_markers: markers.to_vec(),
      }
    }

    fn call_count(&self) -> usize {
      self.calls.lock().unwrap().len()
    }
  }

  #[async_trait]
  impl ActionProcessor for ScriptedProcessor {
    async fn process(&self, action: &QueuedAction) -> Result<ProcessOutcome> {
      if action.kind().is_none() {
        return Ok(ProcessOutcome::Skipped);
      }
      self.calls.lock().unwrap().push(action.clone());
      let marker = action.payload["n"].as_i64().unwrap_or(-1);
      if self.fail_markers.contains(&marker) {
        return Err(eyre!("network down"));
      }
      Ok(ProcessOutcome::Sent)
    }
  }

  fn setup(
    processor: ScriptedProcessor,
    policy: SyncPolicy,
  ) -> (Arc<MemoryQueueStore>, Arc<ScriptedProcessor>, ClientHub, SyncOrchestrator) {
    let store = Arc::new(MemoryQueueStore::new());
    let processor = Arc::new(processor);
    let clients = ClientHub::new();
    let orchestrator =
      SyncOrchestrator::new(store.clone(), processor.clone(), policy, clients.clone());
    (store, processor, clients, orchestrator)
  }

  fn enqueue_n(store: &MemoryQueueStore, n: i64) {
    for i in 0..n {
      store.enqueue("CREATE_OFFER", &json!({ "n": i })).unwrap();
    }
  }

  #[tokio::test]
  async fn test_successful_pass_empties_queue() {
    let (store, processor, _clients, orchestrator) =
      setup(ScriptedProcessor::default(), SyncPolicy::ClearAll);
    enqueue_n(&store, 3);

    let report = orchestrator.run().await;

    assert_eq!(report.succeeded, 3);
    assert_eq!(processor.call_count(), 3);
    assert_eq!(store.len().unwrap(), 0);
    assert_eq!(orchestrator.state(), SyncState::Idle);
  }

  #[tokio::test]
  async fn test_items_processed_in_enqueue_order() {
    let (store, processor, _clients, orchestrator) =
      setup(ScriptedProcessor::default(), SyncPolicy::ClearAll);
    enqueue_n(&store, 4);

    orchestrator.run().await;

    let order: Vec<i64> = processor
      .calls
      .lock()
      .unwrap()
      .iter()
      .map(|a| a.payload["n"].as_i64().unwrap())
      .collect();
    assert_eq!(order, vec![0, 1, 2, 3]);
  }

  #[tokio::test]
  async fn test_clear_all_discards_failed_items() {
    let (store, processor, _clients, orchestrator) =
      setup(ScriptedProcessor::failing(&[1]), SyncPolicy::ClearAll);
    enqueue_n(&store, 3);

    let report = orchestrator.run().await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 2);
    // Processing continued past the failure
    assert_eq!(processor.call_count(), 3);
    assert_eq!(store.len().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_retain_failed_keeps_only_failed_items() {
    let (store, _processor, _clients, orchestrator) =
      setup(ScriptedProcessor::failing(&[1]), SyncPolicy::RetainFailed);
    enqueue_n(&store, 3);

    let report = orchestrator.run().await;

    let remaining = store.drain().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].payload["n"], 1);
    assert_eq!(report.failed_ids, vec![remaining[0].id]);
  }

  #[tokio::test]
  async fn test_unknown_type_completes_without_call() {
    let (store, processor, clients, orchestrator) =
      setup(ScriptedProcessor::default(), SyncPolicy::RetainFailed);
    let mut rx = clients.subscribe();
    store.enqueue("UNKNOWN", &json!({})).unwrap();

    let report = orchestrator.run().await;

    assert_eq!(processor.call_count(), 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.len().unwrap(), 0);
    assert_eq!(
      rx.recv().await.unwrap(),
      ClientMessage::SyncComplete { processed_items: 1 }
    );
  }

  #[tokio::test]
  async fn test_broadcast_reports_drained_not_succeeded() {
    let (store, _processor, clients, orchestrator) =
      setup(ScriptedProcessor::failing(&[0, 2]), SyncPolicy::ClearAll);
    let mut first = clients.subscribe();
    let mut second = clients.subscribe();
    enqueue_n(&store, 3);

    orchestrator.run().await;

    let expected = ClientMessage::SyncComplete { processed_items: 3 };
    assert_eq!(first.recv().await.unwrap(), expected);
    assert_eq!(second.recv().await.unwrap(), expected);
  }

  #[tokio::test]
  async fn test_empty_queue_still_broadcasts() {
    let (_store, _processor, clients, orchestrator) =
      setup(ScriptedProcessor::default(), SyncPolicy::ClearAll);
    let mut rx = clients.subscribe();

    let report = orchestrator.run().await;

    assert_eq!(report, SyncReport::default());
    assert_eq!(
      rx.recv().await.unwrap(),
      ClientMessage::SyncComplete { processed_items: 0 }
    );
  }

  #[tokio::test]
  async fn test_state_returns_to_idle_after_failure() {
    let (store, _processor, _clients, orchestrator) =
      setup(ScriptedProcessor::failing(&[0]), SyncPolicy::ClearAll);
    let mut states = orchestrator.subscribe_state();
    enqueue_n(&store, 1);

    orchestrator.run().await;

    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), SyncState::Idle);
  }

  #[test]
  fn test_state_display() {
    assert_eq!(SyncState::Processing { index: 0, total: 3 }.to_string(), "processing 1/3");
    assert_eq!(SyncState::PartiallyFailed.to_string(), "partially failed");
  }
}
