use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{info, warn};

use crate::{
    error::DeliveryError,
    profiles::{Occupant, ProfileStore},
    transport::{Payload, Transport},
};

/// Reaction to a recipient that could not be reached.
#[async_trait]
pub trait DeliveryPolicy: Send + Sync {
    async fn on_failure(&self, room_name: &str, recipient: &Occupant, err: &DeliveryError);
}

/// Logs the failure and moves on.
pub struct LogOnly;

#[async_trait]
impl DeliveryPolicy for LogOnly {
    async fn on_failure(&self, room_name: &str, recipient: &Occupant, err: &DeliveryError) {
        warn!(room = room_name, recipient = recipient.user_id, %err, "notification not delivered");
    }
}

/// Takes unreachable recipients out of their room.
pub struct EvictUnreachable {
    profiles: ProfileStore,
}

impl EvictUnreachable {
    pub fn new(profiles: ProfileStore) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl DeliveryPolicy for EvictUnreachable {
    async fn on_failure(&self, room_name: &str, recipient: &Occupant, err: &DeliveryError) {
        info!(room = room_name, recipient = recipient.user_id, %err, "evicting unreachable occupant");
        if let Err(evict_err) = self.profiles.set_room(recipient.user_id, None).await {
            warn!(recipient = recipient.user_id, %evict_err, "eviction failed");
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: Vec<i64>,
    pub failed: Vec<i64>,
}

/// Sends `payload` to every recipient concurrently. A failing or slow
/// recipient never holds back the others; each failure goes to `policy`.
pub async fn fan_out(
    transport: &dyn Transport,
    policy: &dyn DeliveryPolicy,
    timeout: Duration,
    room_name: &str,
    recipients: &[Occupant],
    payload: &Payload,
) -> FanOutReport {
    let deliveries = recipients.iter().map(|recipient| async move {
        let outcome = match tokio::time::timeout(timeout, transport.send_to_user(recipient.user_id, payload)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout),
        };
        if let Err(err) = &outcome {
            policy.on_failure(room_name, recipient, err).await;
        }
        (recipient.user_id, outcome.is_ok())
    });

    let mut report = FanOutReport::default();
    for (user_id, delivered) in join_all(deliveries).await {
        if delivered {
            report.delivered.push(user_id);
        } else {
            report.failed.push(user_id);
        }
    }
    report
}
