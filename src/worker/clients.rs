use tokio::sync::broadcast;

use super::messages::ClientMessage;

/// Fan-out channel to every connected UI context.
#[derive(Clone)]
pub struct ClientHub {
  tx: broadcast::Sender<ClientMessage>,
}

impl ClientHub {
  pub fn new() -> Self {
    let (tx, _) = broadcast::channel(64);
    Self { tx }
  }

  /// Connect a UI context
  pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
    self.tx.subscribe()
  }

  /// Send to all connected contexts, returning how many were reached
  pub fn post_all(&self, message: ClientMessage) -> usize {
    // No receivers is not an error: nobody is listening
    self.tx.send(message).unwrap_or(0)
  }
}

impl Default for ClientHub {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_post_without_clients() {
    let hub = ClientHub::new();
    assert_eq!(hub.post_all(ClientMessage::SyncComplete { processed_items: 0 }), 0);
  }

  #[tokio::test]
  async fn test_post_reaches_every_client() {
    let hub = ClientHub::new();
    let mut a = hub.subscribe();
    let mut b = hub.subscribe();
    let msg = ClientMessage::SyncComplete { processed_items: 2 };
    assert_eq!(hub.post_all(msg.clone()), 2);
    assert_eq!(a.recv().await.unwrap(), msg);
    assert_eq!(b.recv().await.unwrap(), msg);
  }
}
