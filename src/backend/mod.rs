//! Remote backend access: the REST table client and the action processor
//! that replays queued actions against it.

mod client;
mod processor;

pub use client::BackendClient;
pub use processor::{ActionProcessor, BackendProcessor, ProcessOutcome};
