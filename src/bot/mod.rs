mod commands;
mod conversation;

pub use commands::{handle, Input, HELP, WELCOME};
pub use conversation::{Conversation, ConversationStore, ProfileDraft};

use axum::{debug_handler, extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    transport::{Attachment, Payload},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/update", post(update))
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Sender {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct FileRef {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub from: Option<Sender>,
    pub text: Option<String>,
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Vec<FileRef>,
    pub audio: Option<FileRef>,
    pub document: Option<FileRef>,
    pub animation: Option<FileRef>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub from: Sender,
    pub data: Option<String>,
}

impl Update {
    /// Who acted and what they did. Updates the bot has no use for give `None`.
    pub fn into_input(self) -> Option<(i64, Input)> {
        if let Some(query) = self.callback_query {
            return Some((query.from.id, Input::Callback(query.data?)));
        }

        let message = self.message?;
        let user_id = message.from?.id;
        let attach = |file: FileRef| Attachment {
            file_id: file.file_id,
            caption: message.caption.clone(),
        };

        // Photos come in several sizes, largest last.
        let input = if let Some(photo) = message.photo.into_iter().last() {
            Input::Media(Payload::Image(attach(photo)))
        } else if let Some(audio) = message.audio {
            Input::Media(Payload::Audio(attach(audio)))
        } else if let Some(document) = message.animation.or(message.document) {
            Input::Media(Payload::Document(attach(document)))
        } else {
            Input::from_text(&message.text?)
        };
        Some((user_id, input))
    }
}

#[debug_handler(state = AppState)]
async fn update(
    State(state): State<AppState>,
    Json(update): Json<Update>,
) -> StatusCode {
    let update_id = update.update_id;
    let Some((user_id, input)) = update.into_input() else {
        debug!(update_id, "ignoring update");
        return StatusCode::OK;
    };

    for reply in handle(&state, user_id, input).await {
        if let Err(err) = state.transport.send_to_user(user_id, &Payload::text(reply)).await {
            warn!(user_id, %err, "reply not delivered");
        }
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> Option<(i64, Input)> {
        serde_json::from_value::<Update>(value).unwrap().into_input()
    }

    #[test]
    fn text_and_commands() {
        let input = parse(json!({"update_id": 1, "message": {"from": {"id": 7}, "text": "/join Lounge"}}));
        assert_eq!(input, Some((7, Input::Command { name: "join".to_owned(), args: "Lounge".to_owned() })));

        let input = parse(json!({"update_id": 2, "message": {"from": {"id": 7}, "text": "hello"}}));
        assert_eq!(input, Some((7, Input::Text("hello".to_owned()))));
    }

    #[test]
    fn largest_photo_wins() {
        let input = parse(json!({"update_id": 3, "message": {
            "from": {"id": 7},
            "caption": "look",
            "photo": [{"file_id": "small"}, {"file_id": "big"}],
        }}));
        let expected = Payload::Image(Attachment { file_id: "big".to_owned(), caption: Some("look".to_owned()) });
        assert_eq!(input, Some((7, Input::Media(expected))));
    }

    #[test]
    fn gifs_are_documents() {
        let input = parse(json!({"update_id": 4, "message": {"from": {"id": 7}, "animation": {"file_id": "gif"}}}));
        assert_eq!(input, Some((7, Input::Media(Payload::Document(Attachment::new("gif"))))));
    }

    #[test]
    fn callbacks_and_unknown_updates() {
        let input = parse(json!({"update_id": 5, "callback_query": {"id": "x", "from": {"id": 8}, "data": "join_Lounge"}}));
        assert_eq!(input, Some((8, Input::Callback("join_Lounge".to_owned()))));

        assert_eq!(parse(json!({"update_id": 6})), None);
        assert_eq!(parse(json!({"update_id": 7, "message": {"from": {"id": 7}}})), None);
    }
}
