use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Payload, Transport};
use crate::error::DeliveryError;

/// Keeps every delivered payload; users marked with `fail_for` are unreachable.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<HashMap<i64, Vec<Payload>>>,
    failing: Mutex<HashSet<i64>>,
}

impl RecordingTransport {
    pub(crate) async fn fail_for(&self, user_id: i64) {
        self.failing.lock().await.insert(user_id);
    }

    pub(crate) async fn sent_to(&self, user_id: i64) -> Vec<Payload> {
        self.sent.lock().await.get(&user_id).cloned().unwrap_or_default()
    }

    pub(crate) async fn texts_to(&self, user_id: i64) -> Vec<String> {
        self.sent_to(user_id)
            .await
            .into_iter()
            .filter_map(|payload| payload.as_text().map(str::to_owned))
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_to_user(&self, user_id: i64, payload: &Payload) -> Result<(), DeliveryError> {
        if self.failing.lock().await.contains(&user_id) {
            return Err(DeliveryError::Unreachable(user_id));
        }
        self.sent.lock().await.entry(user_id).or_default().push(payload.clone());
        Ok(())
    }
}
