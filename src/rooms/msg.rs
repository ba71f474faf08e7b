use std::{sync::Arc, time::Duration};

use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
    error::RelayError,
    profiles::ProfileStore,
    transport::{Payload, Transport},
};

use super::fanout::{fan_out, DeliveryPolicy, EvictUnreachable};

/// Outcome of one room broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub room_name: String,
    pub delivered: Vec<i64>,
    pub evicted: Vec<i64>,
    /// Row id of the stored message, text payloads only.
    pub message_id: Option<i64>,
}

impl SendReport {
    /// Nobody but the sender was in the room.
    pub fn no_recipients(&self) -> bool {
        self.delivered.is_empty() && self.evicted.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub nickname: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

pub(crate) fn room_line(room_name: &str, nickname: &str, text: &str) -> String {
    format!("[{room_name}] {nickname}: {text}")
}

/// Broadcasts a user's messages to the rest of their room.
#[derive(Clone)]
pub struct MessageRouter {
    db_pool: SqlitePool,
    profiles: ProfileStore,
    transport: Arc<dyn Transport>,
    policy: Arc<dyn DeliveryPolicy>,
    delivery_timeout: Duration,
}

impl MessageRouter {
    pub fn new(
        db_pool: SqlitePool,
        profiles: ProfileStore,
        transport: Arc<dyn Transport>,
        delivery_timeout: Duration,
    ) -> Self {
        let policy = Arc::new(EvictUnreachable::new(profiles.clone()));
        Self {
            db_pool,
            profiles,
            transport,
            policy,
            delivery_timeout,
        }
    }

    /// Sends to the room the user currently sits in.
    pub async fn send_to_current(&self, sender_id: i64, payload: Payload) -> Result<SendReport, RelayError> {
        let room_name = self.profiles
            .get_by_external_id(sender_id)
            .await?
            .and_then(|user| user.current_room)
            .ok_or(RelayError::NotInRoom)?;
        self.send(sender_id, &room_name, payload).await
    }

    /// Delivers `payload` to every other occupant of `room_name`. The sender
    /// has to be in that room. Recipients that cannot be reached are evicted.
    pub async fn send(&self, sender_id: i64, room_name: &str, payload: Payload) -> Result<SendReport, RelayError> {
        let sender = self.profiles
            .get_by_external_id(sender_id)
            .await?
            .ok_or(RelayError::UnknownUser(sender_id))?;
        if sender.current_room.as_deref() != Some(room_name) {
            return Err(RelayError::NotInRoom);
        }

        let recipients: Vec<_> = self.profiles
            .list_occupants(room_name)
            .await?
            .into_iter()
            .filter(|occupant| occupant.user_id != sender_id)
            .collect();

        let outbound = match &payload {
            Payload::Text { text } => Payload::text(room_line(room_name, &sender.nickname, text)),
            media => media.with_caption(format!("[{room_name}] {}", sender.nickname)),
        };

        let report = fan_out(
            self.transport.as_ref(),
            self.policy.as_ref(),
            self.delivery_timeout,
            room_name,
            &recipients,
            &outbound,
        ).await;
        debug!(
            room = room_name,
            kind = payload.kind(),
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "room message fanned out"
        );

        let message_id = match payload.as_text() {
            Some(text) => Some(self.store(sender_id, room_name, text).await?),
            None => None,
        };

        if !report.failed.is_empty() {
            info!(room = room_name, evicted = ?report.failed, "unreachable occupants evicted");
        }

        Ok(SendReport {
            room_name: room_name.to_owned(),
            delivered: report.delivered,
            evicted: report.failed,
            message_id,
        })
    }

    async fn store(&self, user_id: i64, room_name: &str, text: &str) -> Result<i64, RelayError> {
        let (message_id,): (i64,) = sqlx::query_as("INSERT INTO messages (user_id,room_name,text,timestamp) VALUES (?,?,?,?) RETURNING message_id")
            .bind(user_id)
            .bind(room_name)
            .bind(text)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(&self.db_pool)
            .await?;
        Ok(message_id)
    }

    /// Oldest first, the first `limit` stored messages of the room.
    pub async fn history(&self, room_name: &str, limit: i64) -> Result<Vec<HistoryEntry>, RelayError> {
        Ok(
            sqlx::query_as(
                "SELECT users.nickname AS nickname, messages.text AS text, messages.timestamp AS timestamp
                 FROM messages JOIN users ON messages.user_id=users.user_id
                 WHERE messages.room_name=?
                 ORDER BY messages.message_id ASC
                 LIMIT ?"
            )
                .bind(room_name)
                .bind(limit)
                .fetch_all(&self.db_pool)
                .await?
        )
    }
}
