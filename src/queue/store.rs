//! Queue store trait with SQLite and in-memory implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::params;
use serde_json::Value;
use std::sync::Arc;

use super::types::QueuedAction;
use crate::db::Database;

/// Trait for durable queue backends.
pub trait QueueStore: Send + Sync {
  /// Append an action, returning its assigned id.
  fn enqueue(&self, action_type: &str, payload: &Value) -> Result<i64>;

  /// All pending actions in insertion order. Does not delete.
  fn drain(&self) -> Result<Vec<QueuedAction>>;

  /// Delete every pending action.
  fn clear(&self) -> Result<()>;

  /// Delete the given actions, leaving the rest in place.
  fn remove(&self, ids: &[i64]) -> Result<()>;

  fn len(&self) -> Result<usize>;
}

#[cfg(test)]
mod memory {
  use super::*;
  use std::sync::Mutex;

  /// In-memory queue, used in tests.
  #[derive(Default)]
  pub struct MemoryQueueStore {
    inner: Mutex<MemoryQueue>,
  }

  #[derive(Default)]
  struct MemoryQueue {
    next_id: i64,
    items: Vec<QueuedAction>,
  }

  impl MemoryQueueStore {
    pub fn new() -> Self {
      Self::default()
    }
  }

  impl QueueStore for MemoryQueueStore {
    fn enqueue(&self, action_type: &str, payload: &Value) -> Result<i64> {
      let mut inner = self.inner.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
      inner.next_id += 1;
      let id = inner.next_id;
      inner.items.push(QueuedAction {
        id,
        action_type: action_type.to_string(),
        payload: payload.clone(),
        enqueued_at: Utc::now(),
      });
      Ok(id)
    }

    fn drain(&self) -> Result<Vec<QueuedAction>> {
      let inner = self.inner.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
      Ok(inner.items.clone())
    }

    fn clear(&self) -> Result<()> {
      let mut inner = self.inner.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
      inner.items.clear();
      Ok(())
    }

    fn remove(&self, ids: &[i64]) -> Result<()> {
      let mut inner = self.inner.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
      inner.items.retain(|item| !ids.contains(&item.id));
      Ok(())
    }

    fn len(&self) -> Result<usize> {
      let inner = self.inner.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
      Ok(inner.items.len())
    }
  }
}

#[cfg(test)]
pub use memory::MemoryQueueStore;

/// SQLite-backed queue in the `offline_actions` table.
pub struct SqliteQueueStore {
  db: Arc<Database>,
}

impl SqliteQueueStore {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }
}

impl QueueStore for SqliteQueueStore {
  fn enqueue(&self, action_type: &str, payload: &Value) -> Result<i64> {
    let mut conn = self.db.lock()?;
    let data =
      serde_json::to_string(payload).map_err(|e| eyre!("Failed to serialize payload: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "INSERT INTO offline_actions (action_type, payload, enqueued_at) VALUES (?, ?, ?)",
      params![action_type, data, Utc::now().to_rfc3339()],
    )
    .map_err(|e| eyre!("Failed to store offline action: {}", e))?;
    let id = tx.last_insert_rowid();

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(id)
  }

  fn drain(&self) -> Result<Vec<QueuedAction>> {
    let conn = self.db.lock()?;

    let mut stmt = conn
      .prepare("SELECT id, action_type, payload, enqueued_at FROM offline_actions ORDER BY id")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows: Vec<(i64, String, String, String)> = stmt
      .query_map([], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })
      .map_err(|e| eyre!("Failed to query offline actions: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read offline action: {}", e))?;

    rows
      .into_iter()
      .map(|(id, action_type, payload, enqueued_at)| {
        let payload: Value = serde_json::from_str(&payload)
          .map_err(|e| eyre!("Failed to deserialize action {}: {}", id, e))?;
        let enqueued_at = DateTime::parse_from_rfc3339(&enqueued_at)
          .map(|dt| dt.with_timezone(&Utc))
          .map_err(|e| eyre!("Failed to parse datetime '{}': {}", enqueued_at, e))?;
        Ok(QueuedAction {
          id,
          action_type,
          payload,
          enqueued_at,
        })
      })
      .collect()
  }

  fn clear(&self) -> Result<()> {
    let conn = self.db.lock()?;
    conn
      .execute("DELETE FROM offline_actions", [])
      .map_err(|e| eyre!("Failed to clear offline actions: {}", e))?;
    Ok(())
  }

  fn remove(&self, ids: &[i64]) -> Result<()> {
    let mut conn = self.db.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    for id in ids {
      tx.execute("DELETE FROM offline_actions WHERE id = ?", params![id])
        .map_err(|e| eyre!("Failed to remove offline action {}: {}", id, e))?;
    }
    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(())
  }

  fn len(&self) -> Result<usize> {
    let conn = self.db.lock()?;
    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM offline_actions", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count offline actions: {}", e))?;
    Ok(count as usize)
  }
}
