use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::{Attachment, Payload, Transport};
use crate::error::DeliveryError;

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Delivers payloads as chat messages through a bot HTTP API.
#[derive(Clone)]
pub struct BotApi {
    http_client: reqwest::Client,
    base_url: String,
}

impl BotApi {
    pub fn new(api_url: &str, token: &str) -> Self {
        BotApi {
            http_client: reqwest::Client::new(),
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        }
    }
}

/// Method name and JSON body for sending `payload` to `chat_id`.
pub(crate) fn build_request(chat_id: i64, payload: &Payload) -> (&'static str, Value) {
    fn media(chat_id: i64, field: &str, attachment: &Attachment) -> Value {
        let mut body = json!({ "chat_id": chat_id, field: attachment.file_id });
        if let Some(caption) = &attachment.caption {
            body["caption"] = json!(caption);
        }
        body
    }

    match payload {
        Payload::Text { text } => ("sendMessage", json!({ "chat_id": chat_id, "text": text })),
        Payload::Image(attachment) => ("sendPhoto", media(chat_id, "photo", attachment)),
        Payload::Audio(attachment) => ("sendAudio", media(chat_id, "audio", attachment)),
        Payload::Document(attachment) => ("sendDocument", media(chat_id, "document", attachment)),
    }
}

#[async_trait]
impl Transport for BotApi {
    async fn send_to_user(&self, user_id: i64, payload: &Payload) -> Result<(), DeliveryError> {
        let (method, body) = build_request(user_id, payload);
        let response: ApiResponse = self.http_client
            .post(format!("{}/{method}", self.base_url))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if response.ok {
            Ok(())
        } else {
            let reason = response.description.unwrap_or_else(|| "unknown error".to_owned());
            warn!(user_id, method, %reason, "bot api refused delivery");
            Err(DeliveryError::Rejected(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_goes_through_send_message() {
        let (method, body) = build_request(42, &Payload::text("[Lounge] A: hi"));
        assert_eq!(method, "sendMessage");
        assert_eq!(body, json!({ "chat_id": 42, "text": "[Lounge] A: hi" }));
    }

    #[test]
    fn media_carries_file_id_and_caption() {
        let photo = Payload::Image(Attachment::new("AgAD")).with_caption("[Lounge] A".to_owned());
        let (method, body) = build_request(42, &photo);
        assert_eq!(method, "sendPhoto");
        assert_eq!(body, json!({ "chat_id": 42, "photo": "AgAD", "caption": "[Lounge] A" }));

        let (method, body) = build_request(42, &Payload::Document(Attachment::new("BQAD")));
        assert_eq!(method, "sendDocument");
        assert_eq!(body, json!({ "chat_id": 42, "document": "BQAD" }));
    }

    #[test]
    fn base_url_tolerates_trailing_slash() {
        let api = BotApi::new("https://api.example.org/", "123:abc");
        assert_eq!(api.base_url, "https://api.example.org/bot123:abc");
    }
}
