use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// Events emitted by the reconciler on every successful state
/// transition. Consumers (analytics, badge counters, dev tooling) are
/// optional; nothing in the cart path depends on them being drained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CartCreated(String),
    /// The whole cart was replaced by a server-authoritative response.
    CartReplaced(String),
    CartItemAdded {
        cart_id: String,
        product_id: String,
        quantity: u32,
    },
    CartItemUpdated {
        cart_id: String,
        product_id: String,
        quantity: u32,
    },
    CartItemRemoved {
        cart_id: String,
        product_id: String,
    },
    CartCleared(String),
    GuestCartMigrated {
        guest_cart_id: String,
        user_cart_id: String,
        migrated_lines: usize,
    },
    SessionStarted {
        cart_id: String,
        authenticated: bool,
    },
    SessionEnded {
        cart_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a bounded channel and wraps the sending half.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging on failure instead of propagating.
    /// Event delivery must never fail a cart operation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("failed to publish cart event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_delivers_event() {
        let (sender, mut rx) = EventSender::channel(4);
        sender
            .send(Event::CartCreated("guest_abc".to_string()))
            .await
            .expect("send");

        match rx.recv().await {
            Some(Event::CartCreated(id)) => assert_eq!(id, "guest_abc"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_or_log_swallows_closed_channel() {
        let (sender, rx) = EventSender::channel(1);
        drop(rx);
        // Must not panic or error out.
        sender.send_or_log(Event::CartCleared("c1".to_string())).await;
    }
}
