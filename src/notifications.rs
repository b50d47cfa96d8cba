//! Client-local notification list, persisted per user as a JSON array in
//! string storage. Lists are most-recent-first and capped at
//! [`MAX_NOTIFICATIONS_PER_USER`].

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::kv::KeyValueStore;

pub const MAX_NOTIFICATIONS_PER_USER: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
  OpportunityCreated,
  OfferReceived,
  OfferAccepted,
  OfferRejected,
  PaymentReceived,
  Message,
  System,
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  #[default]
  Medium,
  High,
  Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
  pub id: String,
  pub user_id: String,
  pub title: String,
  pub message: String,
  #[serde(rename = "type")]
  pub kind: NotificationType,
  pub priority: Priority,
  pub read: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resource_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resource_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub action_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub metadata: Option<Value>,
  pub created_at: DateTime<Utc>,
}

/// Fields supplied by the caller when creating a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
  pub user_id: String,
  pub title: String,
  pub message: String,
  pub kind: NotificationType,
  pub priority: Priority,
  pub resource_id: Option<String>,
  pub resource_type: Option<String>,
  pub action_url: Option<String>,
  pub metadata: Option<Value>,
}

impl NewNotification {
  pub fn new(user_id: &str, kind: NotificationType, title: &str, message: &str) -> Self {
    Self {
      user_id: user_id.to_string(),
      title: title.to_string(),
      message: message.to_string(),
      kind,
      priority: Priority::default(),
      resource_id: None,
      resource_type: None,
      action_url: None,
      metadata: None,
    }
  }

  pub fn priority(mut self, priority: Priority) -> Self {
    self.priority = priority;
    self
  }

  pub fn resource(mut self, resource_type: &str, resource_id: &str) -> Self {
    self.resource_type = Some(resource_type.to_string());
    self.resource_id = Some(resource_id.to_string());
    self
  }

  pub fn action_url(mut self, url: &str) -> Self {
    self.action_url = Some(url.to_string());
    self
  }

  pub fn metadata(mut self, metadata: Value) -> Self {
    self.metadata = Some(metadata);
    self
  }
}

/// Notification service over injected string storage.
#[derive(Clone)]
pub struct NotificationStore {
  kv: Arc<dyn KeyValueStore>,
}

impl NotificationStore {
  pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
    Self { kv }
  }

  fn storage_key(user_id: &str) -> String {
    format!("notifications_{}", user_id)
  }

  fn load(&self, user_id: &str) -> Result<Vec<NotificationRecord>> {
    let Some(raw) = self.kv.get(&Self::storage_key(user_id))? else {
      return Ok(Vec::new());
    };

    match serde_json::from_str(&raw) {
      Ok(list) => Ok(list),
      Err(e) => {
        warn!(user_id, "Discarding unreadable notification list: {}", e);
        Ok(Vec::new())
      }
    }
  }

  fn save(&self, user_id: &str, list: &[NotificationRecord]) -> Result<()> {
    let raw = serde_json::to_string(list)
      .map_err(|e| eyre!("Failed to serialize notifications: {}", e))?;
    self.kv.set(&Self::storage_key(user_id), &raw)
  }

  /// Insert at the front of the user's list, dropping the oldest beyond the cap.
  pub fn create(&self, new: NewNotification) -> Result<NotificationRecord> {
    let record = NotificationRecord {
      id: Uuid::new_v4().to_string(),
      user_id: new.user_id,
      title: new.title,
      message: new.message,
      kind: new.kind,
      priority: new.priority,
      read: false,
      resource_id: new.resource_id,
      resource_type: new.resource_type,
      action_url: new.action_url,
      metadata: new.metadata,
      created_at: Utc::now(),
    };

    let mut list = self.load(&record.user_id)?;
    list.insert(0, record.clone());
    list.truncate(MAX_NOTIFICATIONS_PER_USER);
    self.save(&record.user_id, &list)?;

    debug!(user_id = %record.user_id, id = %record.id, "Stored notification");
    Ok(record)
  }

  /// All notifications for a user, most recent first.
  pub fn list(&self, user_id: &str) -> Result<Vec<NotificationRecord>> {
    self.load(user_id)
  }

  pub fn unread(&self, user_id: &str) -> Result<Vec<NotificationRecord>> {
    Ok(self.load(user_id)?.into_iter().filter(|n| !n.read).collect())
  }

  pub fn unread_count(&self, user_id: &str) -> Result<usize> {
    Ok(self.load(user_id)?.iter().filter(|n| !n.read).count())
  }

  /// Returns false if no notification has that id.
  pub fn mark_as_read(&self, user_id: &str, id: &str) -> Result<bool> {
    let mut list = self.load(user_id)?;
    let Some(record) = list.iter_mut().find(|n| n.id == id) else {
      return Ok(false);
    };
    record.read = true;
    self.save(user_id, &list)?;
    Ok(true)
  }

  /// Returns how many notifications changed.
  pub fn mark_all_as_read(&self, user_id: &str) -> Result<usize> {
    let mut list = self.load(user_id)?;
    let mut changed = 0;
    for record in list.iter_mut().filter(|n| !n.read) {
      record.read = true;
      changed += 1;
    }
    if changed > 0 {
      self.save(user_id, &list)?;
    }
    Ok(changed)
  }

  pub fn delete(&self, user_id: &str, id: &str) -> Result<bool> {
    let mut list = self.load(user_id)?;
    let before = list.len();
    list.retain(|n| n.id != id);
    if list.len() == before {
      return Ok(false);
    }
    self.save(user_id, &list)?;
    Ok(true)
  }

  pub fn clear_all(&self, user_id: &str) -> Result<()> {
    self.kv.remove(&Self::storage_key(user_id))
  }

  // Marketplace event helpers

  pub fn opportunity_created(
    &self,
    user_id: &str,
    opportunity_id: &str,
    opportunity_name: &str,
  ) -> Result<NotificationRecord> {
    self.create(
      NewNotification::new(
        user_id,
        NotificationType::OpportunityCreated,
        "New investment opportunity",
        &format!("{} is now open for investment", opportunity_name),
      )
      .resource("opportunity", opportunity_id)
      .action_url(&format!("/opportunities/{}", opportunity_id)),
    )
  }

  pub fn offer_received(
    &self,
    user_id: &str,
    offer_id: &str,
    opportunity_name: &str,
    amount: f64,
  ) -> Result<NotificationRecord> {
    self.create(
      NewNotification::new(
        user_id,
        NotificationType::OfferReceived,
        "New offer received",
        &format!("You received an offer of ${:.2} for {}", amount, opportunity_name),
      )
      .priority(Priority::High)
      .resource("offer", offer_id)
      .action_url(&format!("/offers/{}", offer_id))
      .metadata(json!({ "amount": amount })),
    )
  }

  pub fn offer_decided(
    &self,
    user_id: &str,
    offer_id: &str,
    opportunity_name: &str,
    accepted: bool,
  ) -> Result<NotificationRecord> {
    let (kind, title, verb) = if accepted {
      (NotificationType::OfferAccepted, "Offer accepted", "accepted")
    } else {
      (NotificationType::OfferRejected, "Offer declined", "declined")
    };
    self.create(
      NewNotification::new(
        user_id,
        kind,
        title,
        &format!("Your offer for {} was {}", opportunity_name, verb),
      )
      .priority(Priority::High)
      .resource("offer", offer_id)
      .action_url(&format!("/offers/{}", offer_id)),
    )
  }

  pub fn payment_received(
    &self,
    user_id: &str,
    payment_id: &str,
    amount: f64,
  ) -> Result<NotificationRecord> {
    self.create(
      NewNotification::new(
        user_id,
        NotificationType::PaymentReceived,
        "Payment received",
        &format!("A payment of ${:.2} has been received", amount),
      )
      .priority(Priority::Urgent)
      .resource("payment", payment_id)
      .action_url("/payments")
      .metadata(json!({ "amount": amount })),
    )
  }

  pub fn new_message(
    &self,
    user_id: &str,
    conversation_id: &str,
    sender_name: &str,
  ) -> Result<NotificationRecord> {
    self.create(
      NewNotification::new(
        user_id,
        NotificationType::Message,
        "New message",
        &format!("{} sent you a message", sender_name),
      )
      .resource("conversation", conversation_id)
      .action_url(&format!("/messages/{}", conversation_id)),
    )
  }

  pub fn system_announcement(
    &self,
    user_id: &str,
    title: &str,
    message: &str,
  ) -> Result<NotificationRecord> {
    self.create(
      NewNotification::new(user_id, NotificationType::System, title, message)
        .priority(Priority::Low),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::kv::MemoryKv;

  fn store() -> (NotificationStore, Arc<MemoryKv>) {
    let kv = Arc::new(MemoryKv::new());
    (NotificationStore::new(kv.clone()), kv)
  }

  fn note(user_id: &str, n: usize) -> NewNotification {
    NewNotification::new(
      user_id,
      NotificationType::System,
      &format!("title {}", n),
      "body",
    )
  }

  #[test]
  fn test_list_is_most_recent_first() {
    let (store, _) = store();
    store.create(note("u1", 1)).unwrap();
    store.create(note("u1", 2)).unwrap();
    let list = store.list("u1").unwrap();
    assert_eq!(list[0].title, "title 2");
    assert_eq!(list[1].title, "title 1");
  }

  #[test]
  fn test_truncates_to_cap() {
    let (store, _) = store();
    for n in 0..=MAX_NOTIFICATIONS_PER_USER {
      store.create(note("u1", n)).unwrap();
    }
    let list = store.list("u1").unwrap();
    assert_eq!(list.len(), MAX_NOTIFICATIONS_PER_USER);
    assert_eq!(list[0].title, format!("title {}", MAX_NOTIFICATIONS_PER_USER));
    assert!(list.iter().all(|n| n.title != "title 0"));
  }

  #[test]
  fn test_users_are_isolated() {
    let (store, _) = store();
    store.create(note("u1", 1)).unwrap();
    assert!(store.list("u2").unwrap().is_empty());
  }

  #[test]
  fn test_read_tracking() {
    let (store, _) = store();
    let a = store.create(note("u1", 1)).unwrap();
    store.create(note("u1", 2)).unwrap();
    assert_eq!(store.unread_count("u1").unwrap(), 2);

    assert!(store.mark_as_read("u1", &a.id).unwrap());
    assert!(!store.mark_as_read("u1", "missing").unwrap());
    assert_eq!(store.unread("u1").unwrap().len(), 1);

    assert_eq!(store.mark_all_as_read("u1").unwrap(), 1);
    assert_eq!(store.unread_count("u1").unwrap(), 0);
  }

  #[test]
  fn test_delete_and_clear() {
    let (store, kv) = store();
    let a = store.create(note("u1", 1)).unwrap();
    store.create(note("u1", 2)).unwrap();

    assert!(store.delete("u1", &a.id).unwrap());
    assert!(!store.delete("u1", &a.id).unwrap());
    assert_eq!(store.list("u1").unwrap().len(), 1);

    store.clear_all("u1").unwrap();
    assert!(kv.get("notifications_u1").unwrap().is_none());
  }

  #[test]
  fn test_corrupt_list_reads_as_empty() {
    let (store, kv) = store();
    kv.set("notifications_u1", "not json").unwrap();
    assert!(store.list("u1").unwrap().is_empty());
    store.create(note("u1", 1)).unwrap();
    assert_eq!(store.list("u1").unwrap().len(), 1);
  }

  #[test]
  fn test_offer_helper_fills_resource_fields() {
    let (store, _) = store();
    let record = store.offer_received("u1", "o-9", "Solar Farm", 5000.0).unwrap();
    assert_eq!(record.kind, NotificationType::OfferReceived);
    assert_eq!(record.priority, Priority::High);
    assert_eq!(record.resource_type.as_deref(), Some("offer"));
    assert_eq!(record.action_url.as_deref(), Some("/offers/o-9"));
    assert!(record.message.contains("$5000.00"));
  }

  #[test]
  fn test_stored_json_uses_type_field() {
    let (store, kv) = store();
    store.offer_decided("u1", "o-1", "Agri Hub", false).unwrap();
    let raw: Value = serde_json::from_str(&kv.get("notifications_u1").unwrap().unwrap()).unwrap();
    assert_eq!(raw[0]["type"], "offer_rejected");
    assert_eq!(raw[0]["read"], false);
  }

  #[test]
  fn test_opportunity_created_helper() {
    let (store, _) = store();
    let record = store.opportunity_created("u1", "opp-3", "Solar Farm").unwrap();
    assert_eq!(record.kind, NotificationType::OpportunityCreated);
    assert_eq!(record.priority, Priority::Medium);
    assert_eq!(record.resource_type.as_deref(), Some("opportunity"));
    assert_eq!(record.resource_id.as_deref(), Some("opp-3"));
    assert_eq!(record.action_url.as_deref(), Some("/opportunities/opp-3"));
    assert_eq!(record.message, "Solar Farm is now open for investment");
  }

  #[test]
  fn test_offer_accepted_helper() {
    let (store, _) = store();
    let record = store.offer_decided("u1", "o-2", "Agri Hub", true).unwrap();
    assert_eq!(record.kind, NotificationType::OfferAccepted);
    assert_eq!(record.title, "Offer accepted");
    assert_eq!(record.priority, Priority::High);
    assert_eq!(record.action_url.as_deref(), Some("/offers/o-2"));
  }

  #[test]
  fn test_payment_received_helper() {
    let (store, _) = store();
    let record = store.payment_received("u1", "pay-7", 250.5).unwrap();
    assert_eq!(record.kind, NotificationType::PaymentReceived);
    assert_eq!(record.priority, Priority::Urgent);
    assert_eq!(record.resource_type.as_deref(), Some("payment"));
    assert_eq!(record.action_url.as_deref(), Some("/payments"));
    assert_eq!(record.metadata, Some(json!({ "amount": 250.5 })));
    assert!(record.message.contains("$250.50"));
  }

  #[test]
  fn test_new_message_helper() {
    let (store, _) = store();
    let record = store.new_message("u1", "conv-1", "Thandi").unwrap();
    assert_eq!(record.kind, NotificationType::Message);
    assert_eq!(record.priority, Priority::Medium);
    assert_eq!(record.resource_id.as_deref(), Some("conv-1"));
    assert_eq!(record.action_url.as_deref(), Some("/messages/conv-1"));
    assert_eq!(record.message, "Thandi sent you a message");
  }

  #[test]
  fn test_system_announcement_helper() {
    let (store, _) = store();
    let record = store
      .system_announcement("u1", "Maintenance", "Back at 06:00")
      .unwrap();
    assert_eq!(record.kind, NotificationType::System);
    assert_eq!(record.priority, Priority::Low);
    assert_eq!(record.title, "Maintenance");
    assert!(record.action_url.is_none());
    assert!(record.resource_id.is_none());
  }
}
