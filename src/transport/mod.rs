//! Delivery of payloads to a single user.
//!
//! The room and mailbox logic only ever talks to [`Transport`]; whether the
//! user sits behind a websocket or a bot chat is decided by the
//! implementation wired into [`crate::AppState`].

mod bot_api;
mod ws_hub;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DeliveryError;

pub use bot_api::BotApi;
pub use ws_hub::WsHub;

/// A file already known to the chat platform, referenced by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl Attachment {
    pub fn new(file_id: impl Into<String>) -> Self {
        Attachment { file_id: file_id.into(), caption: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Text { text: String },
    Image(Attachment),
    Audio(Attachment),
    Document(Attachment),
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Text { .. } => "text",
            Payload::Image(_) => "image",
            Payload::Audio(_) => "audio",
            Payload::Document(_) => "document",
        }
    }

    /// Same payload with its caption replaced. Text payloads are left as they are.
    pub fn with_caption(&self, caption: String) -> Self {
        let captioned = |attachment: &Attachment| Attachment {
            file_id: attachment.file_id.clone(),
            caption: Some(caption.clone()),
        };
        match self {
            Payload::Text { .. } => self.clone(),
            Payload::Image(attachment) => Payload::Image(captioned(attachment)),
            Payload::Audio(attachment) => Payload::Audio(captioned(attachment)),
            Payload::Document(attachment) => Payload::Document(captioned(attachment)),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_to_user(&self, user_id: i64, payload: &Payload) -> Result<(), DeliveryError>;
}

/// Tries each transport in turn and stops at the first one that delivers.
pub struct Fallback {
    transports: Vec<Arc<dyn Transport>>,
}

impl Fallback {
    pub fn new(transports: Vec<Arc<dyn Transport>>) -> Self {
        Self { transports }
    }
}

#[async_trait]
impl Transport for Fallback {
    async fn send_to_user(&self, user_id: i64, payload: &Payload) -> Result<(), DeliveryError> {
        let mut last_err = DeliveryError::Unreachable(user_id);
        for transport in &self.transports {
            match transport.send_to_user(user_id, payload).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    debug!(user_id, %err, "transport failed, trying next");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::RecordingTransport, *};

    #[test]
    fn payload_frames_are_tagged_by_kind() {
        let json = serde_json::to_value(Payload::text("hi")).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "text", "text": "hi" }));

        let image = Payload::Image(Attachment::new("file-1")).with_caption("[Lounge] A".to_owned());
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "image", "file_id": "file-1", "caption": "[Lounge] A" }));
    }

    #[tokio::test]
    async fn fallback_uses_the_first_transport_that_delivers() {
        let primary = Arc::new(RecordingTransport::default());
        primary.fail_for(7).await;
        let secondary = Arc::new(RecordingTransport::default());

        let fallback = Fallback::new(vec![primary.clone(), secondary.clone()]);
        fallback.send_to_user(7, &Payload::text("hello")).await.unwrap();

        assert!(primary.sent_to(7).await.is_empty());
        assert_eq!(secondary.sent_to(7).await, vec![Payload::text("hello")]);
    }

    #[tokio::test]
    async fn fallback_reports_failure_when_nobody_delivers() {
        let only = Arc::new(RecordingTransport::default());
        only.fail_for(7).await;

        let fallback = Fallback::new(vec![only]);
        assert!(fallback.send_to_user(7, &Payload::text("hello")).await.is_err());
    }
}
