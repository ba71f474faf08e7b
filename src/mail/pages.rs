use axum::{debug_handler, extract::{Path, State}, response::{Html, IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use time::macros::format_description;
use tower_sessions::Session;

use crate::{
    include_res,
    mail::{DirectMailbox, MailEntry, CONVERSATION_LIMIT},
    profiles::ProfileStore,
    res::{self, escape},
    session,
    AppResult,
};

#[derive(Deserialize)]
pub(crate) struct DirectMessageForm {
    message: String,
}

fn dm_path(nickname: &str) -> String {
    format!("/dm/{}", urlencoding::encode(nickname))
}

fn entries_to_html(entries: &[MailEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            let time = entry.timestamp
                .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
                .unwrap_or_default();
            include_res!(str, "/pages/mail/entry.html")
                .replace("{sender}", &escape(&entry.sender))
                .replace("{receiver}", &escape(&entry.receiver))
                .replace("{time}", &time)
                .replace("{text}", &escape(&entry.text))
        })
        .collect()
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn inbox(
    State(mailbox): State<DirectMailbox>,
    session: Session,
) -> AppResult<Response> {
    let Some(user_id) = session::current_user(&session).await? else {
        return Ok(Redirect::to("/register").into_response());
    };

    let entries = mailbox.inbox_entries(user_id).await?;
    let body = if entries.is_empty() {
        "<p>You have no direct messages.</p>".to_owned()
    } else {
        entries_to_html(&entries)
    };

    Ok(Html(
        include_res!(str, "/pages/mail/inbox.html")
            .replace("{entries}", &body)
    ).into_response())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn contacts(
    State(profiles): State<ProfileStore>,
    session: Session,
) -> AppResult<Response> {
    let Some(user_id) = session::current_user(&session).await? else {
        return Ok(Redirect::to("/register").into_response());
    };
    let Some(user) = profiles.get_by_external_id(user_id).await? else {
        return Ok(Redirect::to("/register").into_response());
    };

    let items: String = profiles
        .list_nicknames_except(&user.nickname)
        .await?
        .iter()
        .map(|nickname| format!(r#"<li><a href="{}">{}</a></li>"#, dm_path(nickname), escape(nickname)))
        .collect();

    Ok(Html(
        include_res!(str, "/pages/mail/contacts.html")
            .replace("{contacts}", &items)
    ).into_response())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn conversation(
    Path(nickname): Path<String>,
    State(profiles): State<ProfileStore>,
    State(mailbox): State<DirectMailbox>,
    session: Session,
) -> AppResult<Response> {
    let Some(user_id) = session::current_user(&session).await? else {
        return Ok(Redirect::to("/register").into_response());
    };
    let Some(other) = profiles.get_by_nickname(&nickname).await? else {
        return res::sorry("user");
    };

    let entries = mailbox.conversation(user_id, other.user_id, CONVERSATION_LIMIT).await?;

    Ok(Html(
        include_res!(str, "/pages/mail/conversation.html")
            .replace("{nickname}", &escape(&other.nickname))
            .replace("{path}", &dm_path(&other.nickname))
            .replace("{entries}", &entries_to_html(&entries))
    ).into_response())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn send(
    Path(nickname): Path<String>,
    State(profiles): State<ProfileStore>,
    State(mailbox): State<DirectMailbox>,
    session: Session,

    Form(DirectMessageForm { message }): Form<DirectMessageForm>,
) -> AppResult<Response> {
    let Some(user_id) = session::current_user(&session).await? else {
        return Ok(Redirect::to("/register").into_response());
    };
    let Some(other) = profiles.get_by_nickname(&nickname).await? else {
        return res::sorry("user");
    };

    let message = message.trim();
    if !message.is_empty() {
        mailbox.send(user_id, other.user_id, message).await?;
    }
    Ok(Redirect::to(&dm_path(&other.nickname)).into_response())
}
