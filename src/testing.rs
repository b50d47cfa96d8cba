//! Test doubles shared across module tests.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::cache::{Fetcher, Request, Response};
use crate::worker::{Platform, PushNotification};

/// Fetcher serving canned responses by url and recording every call.
pub struct StubFetcher {
  responses: Mutex<HashMap<String, Response>>,
  calls: Mutex<Vec<String>>,
  online: AtomicBool,
}

impl StubFetcher {
  pub fn new() -> Self {
    Self {
      responses: Mutex::new(HashMap::new()),
      calls: Mutex::new(Vec::new()),
      online: AtomicBool::new(true),
    }
  }

  pub fn respond(&self, url: &str, response: Response) {
    self
      .responses
      .lock()
      .unwrap()
      .insert(url.to_string(), response);
  }

  pub fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
  }

  pub fn calls_to(&self, url: &str) -> usize {
    self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
  }
}

#[async_trait]
impl Fetcher for StubFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let url = request.url.to_string();
    self.calls.lock().unwrap().push(url.clone());

    if !self.online.load(Ordering::SeqCst) {
      return Err(eyre!("Failed to fetch {}: offline", url));
    }

    Ok(
      self
        .responses
        .lock()
        .unwrap()
        .get(&url)
        .cloned()
        .unwrap_or_else(|| Response::new(404, "")),
    )
  }
}

/// Platform recording every call, with or without background sync support.
pub struct RecordingPlatform {
  sync_supported: bool,
  registrations: Mutex<Vec<String>>,
  notifications: Mutex<Vec<PushNotification>>,
  windows: Mutex<Vec<String>>,
}

impl RecordingPlatform {
  fn new(sync_supported: bool) -> Self {
    Self {
      sync_supported,
      registrations: Mutex::new(Vec::new()),
      notifications: Mutex::new(Vec::new()),
      windows: Mutex::new(Vec::new()),
    }
  }

  pub fn with_sync() -> Self {
    Self::new(true)
  }

  pub fn without_sync() -> Self {
    Self::new(false)
  }

  pub fn sync_registrations(&self) -> Vec<String> {
    self.registrations.lock().unwrap().clone()
  }

  pub fn notifications(&self) -> Vec<PushNotification> {
    self.notifications.lock().unwrap().clone()
  }

  pub fn opened_windows(&self) -> Vec<String> {
    self.windows.lock().unwrap().clone()
  }
}

impl Platform for RecordingPlatform {
  fn register_sync(&self, tag: &str) -> Result<()> {
    if !self.sync_supported {
      return Err(eyre!("sync unsupported"));
    }
    self.registrations.lock().unwrap().push(tag.to_string());
    Ok(())
  }

  fn show_notification(&self, notification: &PushNotification) -> Result<()> {
    self.notifications.lock().unwrap().push(notification.clone());
    Ok(())
  }

  fn open_window(&self, url: &str) -> Result<()> {
    self.windows.lock().unwrap().push(url.to_string());
    Ok(())
  }
}
