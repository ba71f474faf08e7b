mod mailbox;
mod pages;

use axum::{routing::get, Router};

use crate::AppState;

pub use mailbox::{DirectMailbox, MailEntry};

/// Number of messages shown in a direct conversation.
pub const CONVERSATION_LIMIT: i64 = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mail", get(pages::inbox))
        .route("/dm", get(pages::contacts))
        .route("/dm/{nickname}", get(pages::conversation).post(pages::send))
}
