//! Replays a queued action as one backend call.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use tracing::{debug, warn};

use super::client::BackendClient;
use crate::queue::{ActionType, QueuedAction};

/// Result of processing one action that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
  /// The backend accepted the call
  Sent,
  /// The action type is unknown; dropped without a network call
  Skipped,
}

/// Trait for anything that can replay queued actions.
#[async_trait]
pub trait ActionProcessor: Send + Sync {
  async fn process(&self, action: &QueuedAction) -> Result<ProcessOutcome>;
}

/// Processor that maps each action type to a backend table call.
#[derive(Clone)]
pub struct BackendProcessor {
  client: BackendClient,
}

impl BackendProcessor {
  pub fn new(client: BackendClient) -> Self {
    Self { client }
  }
}

#[async_trait]
impl ActionProcessor for BackendProcessor {
  async fn process(&self, action: &QueuedAction) -> Result<ProcessOutcome> {
    let Some(kind) = action.kind() else {
      warn!(
        id = action.id,
        action_type = %action.action_type,
        "Unknown offline action type, dropping"
      );
      return Ok(ProcessOutcome::Skipped);
    };

    debug!(id = action.id, %kind, "Replaying offline action");

    match kind {
      ActionType::CreateOpportunity => {
        self.client.insert("opportunities", &action.payload).await?;
      }
      ActionType::CreateOffer => {
        self.client.insert("offers", &action.payload).await?;
      }
      ActionType::UpdateProfile => {
        let id = payload_id(&action.payload)
          .ok_or_else(|| eyre!("UPDATE_PROFILE action {} has no id", action.id))?;
        self
          .client
          .update_by_id("profiles", &id, &action.payload)
          .await?;
      }
    }

    Ok(ProcessOutcome::Sent)
  }
}

/// Row id from a payload; ids may be strings (uuids) or numbers.
fn payload_id(payload: &Value) -> Option<String> {
  match payload.get("id")? {
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}
