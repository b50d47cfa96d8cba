//! Services the hosting runtime provides to the worker.

use color_eyre::{eyre::eyre, Result};
use tracing::info;

use super::messages::PushNotification;

pub trait Platform: Send + Sync {
  /// Ask to be woken with a sync event once connectivity allows.
  fn register_sync(&self, tag: &str) -> Result<()>;

  fn show_notification(&self, notification: &PushNotification) -> Result<()>;

  fn open_window(&self, url: &str) -> Result<()>;
}

/// Platform for headless hosts: no background sync facility, notifications
/// and window requests are logged.
pub struct HeadlessPlatform;

impl Platform for HeadlessPlatform {
  fn register_sync(&self, tag: &str) -> Result<()> {
    Err(eyre!("Background sync is not available (tag {})", tag))
  }

  fn show_notification(&self, notification: &PushNotification) -> Result<()> {
    info!(
      title = %notification.title,
      body = %notification.body,
      url = %notification.url,
      "Show notification"
    );
    Ok(())
  }

  fn open_window(&self, url: &str) -> Result<()> {
    info!(url, "Open window");
    Ok(())
  }
}
