pub mod kv;
pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Shared SQLite connection backing the queue, key-value and response stores.
pub struct Database {
  conn: Mutex<Connection>,
}

impl Database {
  /// Open or create the database at `path`
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open a private in-memory database
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let db = Self {
      conn: Mutex::new(conn),
    };
    db.run_migrations()?;
    Ok(db)
  }

  /// Run database migrations, refusing databases written by a newer schema
  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    let version: i64 = conn
      .query_row("PRAGMA user_version", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to read schema version: {}", e))?;

    if version > schema::SCHEMA_VERSION {
      return Err(eyre!(
        "Database schema version {} is newer than supported version {}",
        version,
        schema::SCHEMA_VERSION
      ));
    }

    conn
      .execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;

    conn
      .pragma_update(None, "user_version", schema::SCHEMA_VERSION)
      .map_err(|e| eyre!("Failed to set schema version: {}", e))?;

    Ok(())
  }

  /// Lock the connection for a unit of work
  pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_open_sets_schema_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("worker.db");
    let db = Database::open(&path).unwrap();

    let version: i64 = db
      .lock()
      .unwrap()
      .query_row("PRAGMA user_version", [], |row| row.get(0))
      .unwrap();
    assert_eq!(version, schema::SCHEMA_VERSION);
    assert!(path.exists());
  }

  #[test]
  fn test_reopen_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worker.db");
    drop(Database::open(&path).unwrap());
    assert!(Database::open(&path).is_ok());
  }

  #[test]
  fn test_newer_schema_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worker.db");
    {
      let conn = Connection::open(&path).unwrap();
      conn.pragma_update(None, "user_version", 99).unwrap();
    }
    assert!(Database::open(&path).is_err());
  }
}
