//! The process-wide map of live connections.
//!
//! One entry per authenticated socket: phone number → the sender half of
//! that socket's writer channel, plus the time zone reported at login.
//! This map is the single source of truth for "who is online"; every
//! fan-out resolves recipients through it. Reads (sends, membership
//! checks) take the read lock and may proceed concurrently; login and
//! disconnect take the write lock.

use std::collections::HashMap;

use axum::extract::ws::Message;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// Sender half of a session's writer channel. Cloned into the registry at
/// login; pushing to it never blocks the caller.
pub type ClientSender = mpsc::UnboundedSender<Message>;

#[derive(Default)]
struct Inner {
    clients: HashMap<i64, ClientSender>,
    time_zones: HashMap<i64, String>,
}

/// Thread-safe phone → connection map. See module docs.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under `phone`, replacing any previous one
    /// (single-device model: the newest login wins).
    pub async fn insert(&self, phone: i64, sender: ClientSender, time_zone: String) {
        let mut inner = self.inner.write().await;
        if inner.clients.insert(phone, sender).is_some() {
            debug!(phone, "replaced existing registry entry");
        }
        inner.time_zones.insert(phone, time_zone);
    }

    pub async fn remove(&self, phone: i64) {
        let mut inner = self.inner.write().await;
        inner.clients.remove(&phone);
        inner.time_zones.remove(&phone);
    }

    pub async fn contains(&self, phone: i64) -> bool {
        self.inner.read().await.clients.contains_key(&phone)
    }

    pub async fn time_zone(&self, phone: i64) -> Option<String> {
        self.inner.read().await.time_zones.get(&phone).cloned()
    }

    /// Deliver one frame to `phone` if it is online. Returns false when
    /// the phone is offline or its writer has already shut down; a
    /// dropped recipient never fails the caller.
    pub async fn send_to(&self, phone: i64, frame: &Value) -> bool {
        let inner = self.inner.read().await;
        match inner.clients.get(&phone) {
            Some(sender) => sender.send(Message::Text(frame.to_string())).is_ok(),
            None => false,
        }
    }

    /// Fan one frame out to every phone in `phones` that is online.
    /// Returns how many sockets accepted it.
    pub async fn send_to_many(&self, phones: &[i64], frame: &Value) -> usize {
        let inner = self.inner.read().await;
        let text = frame.to_string();
        let mut delivered = 0;
        for phone in phones {
            if let Some(sender) = inner.clients.get(phone) {
                if sender.send(Message::Text(text.clone())).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.clients.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn channel() -> (ClientSender, mpsc::UnboundedReceiver<Message>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn insert_send_remove() {
        let registry = Registry::new();
        let (tx, mut rx) = channel();
        registry.insert(1001, tx, "UTC".into()).await;

        assert!(registry.contains(1001).await);
        assert_eq!(registry.time_zone(1001).await.as_deref(), Some("UTC"));
        assert!(registry.send_to(1001, &json!({"type": "ping"})).await);

        match rx.recv().await {
            Some(Message::Text(text)) => assert!(text.contains("ping")),
            other => panic!("unexpected message: {:?}", other),
        }

        registry.remove(1001).await;
        assert!(!registry.contains(1001).await);
        assert!(!registry.send_to(1001, &json!({})).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn offline_phones_are_skipped_in_fan_out() {
        let registry = Registry::new();
        let (tx1, mut rx1) = channel();
        let (tx3, mut rx3) = channel();
        registry.insert(1, tx1, String::new()).await;
        registry.insert(3, tx3, String::new()).await;

        let delivered = registry
            .send_to_many(&[1, 2, 3], &json!({"type": "client_connected"}))
            .await;
        assert_eq!(delivered, 2);
        assert!(rx1.recv().await.is_some());
        assert!(rx3.recv().await.is_some());
    }

    #[tokio::test]
    async fn closed_receiver_counts_as_offline() {
        let registry = Registry::new();
        let (tx, rx) = channel();
        registry.insert(1001, tx, String::new()).await;
        drop(rx);
        assert!(!registry.send_to(1001, &json!({})).await);
    }

    #[tokio::test]
    async fn newest_login_wins() {
        let registry = Registry::new();
        let (tx_old, mut rx_old) = channel();
        let (tx_new, mut rx_new) = channel();
        registry.insert(1001, tx_old, "UTC".into()).await;
        registry.insert(1001, tx_new, "CET".into()).await;
        assert_eq!(registry.len().await, 1);

        registry.send_to(1001, &json!({"n": 1})).await;
        assert!(rx_new.recv().await.is_some());
        assert!(rx_old.try_recv().is_err());
        assert_eq!(registry.time_zone(1001).await.as_deref(), Some("CET"));
    }
}
