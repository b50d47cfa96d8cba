//! Response storage trait with SQLite and in-memory implementations.

use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use super::traits::Response;
use crate::db::Database;

/// A cached response with its bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
  pub url: String,
  pub response: Response,
  pub cached_at: DateTime<Utc>,
}

/// Trait for response storage backends.
///
/// Entries within a bucket are ordered by when they were (re)added.
pub trait ResponseStorage: Send + Sync {
  fn get(&self, bucket: &str, key: &str) -> Result<Option<StoredResponse>>;

  /// Store an entry, replacing any entry with the same key, then evict the
  /// oldest entries beyond `max_entries`. Returns the number evicted.
  fn put(
    &self,
    bucket: &str,
    key: &str,
    entry: &StoredResponse,
    max_entries: Option<usize>,
  ) -> Result<usize>;

  fn delete(&self, bucket: &str, key: &str) -> Result<bool>;

  /// Urls in the bucket, oldest first.
  fn urls(&self, bucket: &str) -> Result<Vec<String>>;

  /// Delete entries cached before `cutoff`. Returns the number deleted.
  fn purge_before(&self, bucket: &str, cutoff: DateTime<Utc>) -> Result<usize>;
}


#[cfg(test)]
pub use memory::MemoryResponseStorage;

/// SQLite-based storage in the `response_cache` table.
pub struct SqliteResponseStorage {
  db: Arc<Database>,
}

impl SqliteResponseStorage {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }
}

impl ResponseStorage for SqliteResponseStorage {
  fn get(&self, bucket: &str, key: &str) -> Result<Option<StoredResponse>> {
    let conn = self.db.lock()?;

    let row: Option<(String, u16, String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT url, status, headers, body, cached_at FROM response_cache
         WHERE bucket = ? AND cache_key = ?",
        params![bucket, key],
        |row| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
          ))
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cached response: {}", e))?;

    let Some((url, status, headers, body, cached_at)) = row else {
      return Ok(None);
    };

    let headers: Vec<(String, String)> = serde_json::from_str(&headers)
      .map_err(|e| eyre!("Failed to deserialize headers for {}: {}", url, e))?;

    Ok(Some(StoredResponse {
      url,
      response: Response {
        status,
        headers,
        body,
      },
      cached_at: parse_datetime(&cached_at)?,
    }))
  }

  fn put(
    &self,
    bucket: &str,
    key: &str,
    entry: &StoredResponse,
    max_entries: Option<usize>,
  ) -> Result<usize> {
    let mut conn = self.db.lock()?;
    let headers = serde_json::to_string(&entry.response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    // OR REPLACE deletes the old row, so a re-added entry gets a fresh seq
    tx.execute(
      "INSERT OR REPLACE INTO response_cache
         (bucket, cache_key, url, status, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?)",
      params![
        bucket,
        key,
        entry.url,
        entry.response.status,
        headers,
        entry.response.body,
        entry.cached_at.to_rfc3339_opts(SecondsFormat::Micros, true)
      ],
    )
    .map_err(|e| eyre!("Failed to store response: {}", e))?;

    let evicted = match max_entries {
      Some(max) => tx
        .execute(
          "DELETE FROM response_cache WHERE bucket = ?1 AND seq NOT IN (
             SELECT seq FROM response_cache WHERE bucket = ?1 ORDER BY seq DESC LIMIT ?2
           )",
          params![bucket, max as i64],
        )
        .map_err(|e| eyre!("Failed to evict responses: {}", e))?,
      None => 0,
    };

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(evicted)
  }

  fn delete(&self, bucket: &str, key: &str) -> Result<bool> {
    let conn = self.db.lock()?;
    let deleted = conn
      .execute(
        "DELETE FROM response_cache WHERE bucket = ? AND cache_key = ?",
        params![bucket, key],
      )
      .map_err(|e| eyre!("Failed to delete cached response: {}", e))?;
    Ok(deleted > 0)
  }

  fn urls(&self, bucket: &str) -> Result<Vec<String>> {
    let conn = self.db.lock()?;
    let mut stmt = conn
      .prepare("SELECT url FROM response_cache WHERE bucket = ? ORDER BY seq")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let urls = stmt
      .query_map(params![bucket], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query cached urls: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cached url: {}", e))?;

    Ok(urls)
  }

  fn purge_before(&self, bucket: &str, cutoff: DateTime<Utc>) -> Result<usize> {
    let conn = self.db.lock()?;

    // Fixed-width UTC timestamps sort chronologically as text
    let deleted = conn
      .execute(
        "DELETE FROM response_cache WHERE bucket = ? AND cached_at < ?",
        params![bucket, cutoff.to_rfc3339_opts(SecondsFormat::Micros, true)],
      )
      .map_err(|e| eyre!("Failed to purge expired responses: {}", e))?;

    Ok(deleted)
  }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
