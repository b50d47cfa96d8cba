use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Action kinds the processor knows how to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
  CreateOpportunity,
  CreateOffer,
  UpdateProfile,
}

impl ActionType {
  pub const ALL: &'static [ActionType] = &[
    ActionType::CreateOpportunity,
    ActionType::CreateOffer,
    ActionType::UpdateProfile,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ActionType::CreateOpportunity => "CREATE_OPPORTUNITY",
      ActionType::CreateOffer => "CREATE_OFFER",
      ActionType::UpdateProfile => "UPDATE_PROFILE",
    }
  }

  /// Parse a wire name. Unknown names return None.
  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.iter().copied().find(|t| t.as_str() == s)
  }
}

impl fmt::Display for ActionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A persisted action. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
  pub id: i64,
  /// Wire name; may be a type this build does not recognise
  #[serde(rename = "type")]
  pub action_type: String,
  pub payload: Value,
  pub enqueued_at: DateTime<Utc>,
}

impl QueuedAction {
  pub fn kind(&self) -> Option<ActionType> {
    ActionType::parse(&self.action_type)
  }
}
