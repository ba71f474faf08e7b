use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use super::{Payload, Transport};
use crate::error::DeliveryError;

struct Connection {
    id: u64,
    tx: mpsc::UnboundedSender<String>,
}

/// Live websocket connections, one per user. A newer connection replaces
/// the older one.
#[derive(Clone, Default)]
pub struct WsHub {
    connections: Arc<RwLock<HashMap<i64, Connection>>>,
    next_id: Arc<AtomicU64>,
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection for `user_id`. Frames for the user arrive on the
    /// returned receiver until `disconnect` is called with the returned id.
    pub async fn connect(&self, user_id: i64) -> (u64, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.write().await.insert(user_id, Connection { id, tx });
        debug!(user_id, connection = id, "websocket connected");
        (id, rx)
    }

    pub async fn disconnect(&self, user_id: i64, connection_id: u64) {
        let mut connections = self.connections.write().await;
        if connections.get(&user_id).is_some_and(|conn| conn.id == connection_id) {
            connections.remove(&user_id);
            debug!(user_id, connection = connection_id, "websocket disconnected");
        }
    }
}

#[async_trait]
impl Transport for WsHub {
    async fn send_to_user(&self, user_id: i64, payload: &Payload) -> Result<(), DeliveryError> {
        let frame = serde_json::to_string(payload)
            .map_err(|err| DeliveryError::Rejected(err.to_string()))?;

        let connections = self.connections.read().await;
        let conn = connections.get(&user_id).ok_or(DeliveryError::Unreachable(user_id))?;
        conn.tx.send(frame).map_err(|_| DeliveryError::Unreachable(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_reach_the_connected_user() {
        let hub = WsHub::new();
        let (_, mut rx) = hub.connect(1).await;

        hub.send_to_user(1, &Payload::text("hi")).await.unwrap();

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame, r#"{"kind":"text","text":"hi"}"#);
    }

    #[tokio::test]
    async fn unknown_or_closed_connections_are_unreachable() {
        let hub = WsHub::new();
        assert!(matches!(
            hub.send_to_user(1, &Payload::text("hi")).await,
            Err(DeliveryError::Unreachable(1))
        ));

        let (_, rx) = hub.connect(2).await;
        drop(rx);
        assert!(hub.send_to_user(2, &Payload::text("hi")).await.is_err());
    }

    #[tokio::test]
    async fn stale_disconnect_keeps_the_newer_connection() {
        let hub = WsHub::new();
        let (old_id, _old_rx) = hub.connect(1).await;
        let (_, mut new_rx) = hub.connect(1).await;

        hub.disconnect(1, old_id).await;
        hub.send_to_user(1, &Payload::text("still here")).await.unwrap();
        assert!(new_rx.recv().await.is_some());
    }
}
