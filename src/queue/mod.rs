//! Durable queue of actions recorded while offline.
//!
//! Actions are appended with an auto-incrementing id and replayed in
//! insertion order by the sync orchestrator. Nothing is deleted until a
//! sync pass explicitly clears or removes records.

mod store;
mod types;

#[cfg(test)]
pub use store::MemoryQueueStore;
pub use store::{QueueStore, SqliteQueueStore};
pub use types::{ActionType, QueuedAction};
