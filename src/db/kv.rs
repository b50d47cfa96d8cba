//! Local string storage, one value per key.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use super::Database;

/// Trait for string key-value backends.
pub trait KeyValueStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&self, key: &str, value: &str) -> Result<()>;

  fn remove(&self, key: &str) -> Result<()>;
}

#[cfg(test)]
mod memory {
  use super::*;
  use std::collections::HashMap;
  use std::sync::Mutex;

  /// In-memory store, lost on drop.
  #[derive(Default)]
  pub struct MemoryKv {
    values: Mutex<HashMap<String, String>>,
  }

  impl MemoryKv {
    pub fn new() -> Self {
      Self::default()
    }
  }

  impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
      let values = self.values.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
      Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
      let mut values = self.values.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
      values.insert(key.to_string(), value.to_string());
      Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
      let mut values = self.values.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
      values.remove(key);
      Ok(())
    }
  }
}

#[cfg(test)]
pub use memory::MemoryKv;

/// SQLite-backed store in the `kv_store` table.
pub struct SqliteKv {
  db: Arc<Database>,
}

impl SqliteKv {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }
}

impl KeyValueStore for SqliteKv {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self.db.lock()?;
    conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read key {}: {}", key, e))
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let conn = self.db.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write key {}: {}", key, e))?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self.db.lock()?;
    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove key {}: {}", key, e))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn exercise(store: &dyn KeyValueStore) {
    assert_eq!(store.get("a").unwrap(), None);
    store.set("a", "1").unwrap();
    store.set("a", "2").unwrap();
    assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
    store.remove("a").unwrap();
    assert_eq!(store.get("a").unwrap(), None);
  }

  #[test]
  fn test_memory_kv() {
    exercise(&MemoryKv::new());
  }

  #[test]
  fn test_sqlite_kv() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    exercise(&SqliteKv::new(db));
  }

  #[test]
  fn test_sqlite_kv_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worker.db");
    {
      let store = SqliteKv::new(Arc::new(Database::open(&path).unwrap()));
      store.set("notifications_u1", "[]").unwrap();
    }
    let store = SqliteKv::new(Arc::new(Database::open(&path).unwrap()));
    assert_eq!(store.get("notifications_u1").unwrap().as_deref(), Some("[]"));
  }
}
