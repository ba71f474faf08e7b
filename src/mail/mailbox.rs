use std::{sync::Arc, time::Duration};

use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    db::DirectMessage,
    error::{DeliveryError, RelayError},
    profiles::ProfileStore,
    transport::{Payload, Transport},
};

/// A mailbox row with the nicknames resolved, for display.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MailEntry {
    pub sender: String,
    pub receiver: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Clone)]
pub struct DirectMailbox {
    db_pool: SqlitePool,
    profiles: ProfileStore,
    transport: Arc<dyn Transport>,
    delivery_timeout: Duration,
}

impl DirectMailbox {
    pub fn new(
        db_pool: SqlitePool,
        profiles: ProfileStore,
        transport: Arc<dyn Transport>,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            db_pool,
            profiles,
            transport,
            delivery_timeout,
        }
    }

    /// Stores the message and pushes a copy to the receiver. The push is
    /// best-effort; the stored row is what the receiver's inbox shows.
    pub async fn send(&self, sender_id: i64, receiver_id: i64, text: &str) -> Result<DirectMessage, RelayError> {
        let sender = self.profiles
            .get_by_external_id(sender_id)
            .await?
            .ok_or_else(|| RelayError::UnknownRecipient(sender_id.to_string()))?;
        if self.profiles.get_by_external_id(receiver_id).await?.is_none() {
            return Err(RelayError::UnknownRecipient(receiver_id.to_string()));
        }

        let message: DirectMessage = sqlx::query_as(
            "INSERT INTO private_messages (sender_id,receiver_id,text,timestamp) VALUES (?,?,?,?)
             RETURNING message_id,sender_id,receiver_id,text,timestamp"
        )
            .bind(sender_id)
            .bind(receiver_id)
            .bind(text)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(&self.db_pool)
            .await?;
        info!(sender_id, receiver_id, message_id = message.message_id, "direct message stored");

        let notice = Payload::text(format!("Direct message from {}:\n{text}", sender.nickname));
        let push = tokio::time::timeout(self.delivery_timeout, self.transport.send_to_user(receiver_id, &notice));
        match push.await.unwrap_or(Err(DeliveryError::Timeout)) {
            Ok(()) => {}
            Err(err) => warn!(receiver_id, %err, "direct message push failed"),
        }

        Ok(message)
    }

    /// Messages addressed to `user_id`, newest first.
    pub async fn list_inbox(&self, user_id: i64) -> Result<Vec<DirectMessage>, RelayError> {
        Ok(
            sqlx::query_as(
                "SELECT message_id,sender_id,receiver_id,text,timestamp FROM private_messages
                 WHERE receiver_id=?
                 ORDER BY message_id DESC"
            )
                .bind(user_id)
                .fetch_all(&self.db_pool)
                .await?
        )
    }

    /// Same as `list_inbox`, with nicknames.
    pub async fn inbox_entries(&self, user_id: i64) -> Result<Vec<MailEntry>, RelayError> {
        Ok(
            sqlx::query_as(
                "SELECT sender.nickname AS sender, receiver.nickname AS receiver, pm.text AS text, pm.timestamp AS timestamp
                 FROM private_messages pm
                 JOIN users sender ON pm.sender_id=sender.user_id
                 JOIN users receiver ON pm.receiver_id=receiver.user_id
                 WHERE pm.receiver_id=?
                 ORDER BY pm.message_id DESC"
            )
                .bind(user_id)
                .fetch_all(&self.db_pool)
                .await?
        )
    }

    /// Messages exchanged between two users in either direction, newest first.
    pub async fn conversation(&self, user_id: i64, other_id: i64, limit: i64) -> Result<Vec<MailEntry>, RelayError> {
        Ok(
            sqlx::query_as(
                "SELECT sender.nickname AS sender, receiver.nickname AS receiver, pm.text AS text, pm.timestamp AS timestamp
                 FROM private_messages pm
                 JOIN users sender ON pm.sender_id=sender.user_id
                 JOIN users receiver ON pm.receiver_id=receiver.user_id
                 WHERE (pm.sender_id=? AND pm.receiver_id=?) OR (pm.sender_id=? AND pm.receiver_id=?)
                 ORDER BY pm.message_id DESC
                 LIMIT ?"
            )
                .bind(user_id)
                .bind(other_id)
                .bind(other_id)
                .bind(user_id)
                .bind(limit)
                .fetch_all(&self.db_pool)
                .await?
        )
    }
}
