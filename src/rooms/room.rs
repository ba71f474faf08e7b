use axum::{debug_handler, extract::{Path, State}, response::{Html, IntoResponse, Redirect, Response}, Form, Json};
use serde::Deserialize;
use time::macros::format_description;
use tower_sessions::Session;

use crate::{
    error::RelayError,
    include_res,
    res::{self, escape, room_path},
    rooms::{HistoryEntry, Membership, MembershipManager, MessageRouter, RoomDirectory, HISTORY_LIMIT},
    session,
    transport::Payload,
    AppResult,
};

#[derive(Deserialize)]
pub(crate) struct SendMessageForm {
    message: String,
}

pub(crate) fn entry_to_html(entry: &HistoryEntry) -> String {
    let mut text_html = String::new();
    pulldown_cmark::html::push_html(&mut text_html, pulldown_cmark::Parser::new(&escape(&entry.text)));
    // the renderer decodes the brace entities again
    let text_html = text_html.replace('{', "&#123;").replace('}', "&#125;");

    let time = entry.timestamp
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_default();

    include_res!(str, "/pages/rooms/message.html")
        .replace("{nickname}", &escape(&entry.nickname))
        .replace("{profile}", &format!("/p/{}", urlencoding::encode(&entry.nickname)))
        .replace("{time}", &time)
        .replace("{text}", &text_html)
}

/// Whether the visitor sits in `room_name`. Anonymous visitors never do.
async fn occupies(membership: &MembershipManager, user_id: Option<i64>, room_name: &str) -> Result<bool, RelayError> {
    let Some(user_id) = user_id else {
        return Ok(false);
    };
    Ok(membership.state(user_id).await? == Membership::InRoom(room_name.to_owned()))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room(
    Path(name): Path<String>,
    State(rooms): State<RoomDirectory>,
    State(router): State<MessageRouter>,
    State(membership): State<MembershipManager>,
    session: Session,
) -> AppResult<Response> {
    let Some(description) = rooms.describe(&name).await? else {
        return res::sorry("room");
    };

    let inside = occupies(&membership, session::current_user(&session).await?, &name).await?;

    let messages: String = router
        .history(&name, HISTORY_LIMIT)
        .await?
        .iter()
        .map(entry_to_html)
        .collect();

    let controls = if inside {
        include_res!(str, "/pages/rooms/send_form.html")
    } else {
        include_res!(str, "/pages/rooms/join_form.html")
    };

    let body = include_res!(str, "/pages/rooms/room.html")
        .replace("{controls}", controls)
        .replace("{room_path}", &room_path(&name))
        .replace("{room_name}", &escape(&name))
        .replace("{description}", &escape(&description))
        .replace("{messages}", &messages);

    Ok(Html(body).into_response())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn messages(
    Path(name): Path<String>,
    State(router): State<MessageRouter>,
) -> AppResult<Json<Vec<HistoryEntry>>> {
    Ok(Json(router.history(&name, HISTORY_LIMIT).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn join(
    Path(name): Path<String>,
    State(membership): State<MembershipManager>,
    session: Session,
) -> AppResult<Response> {
    let Some(user_id) = session::current_user(&session).await? else {
        return Ok(Redirect::to("/register").into_response());
    };

    let joined = membership.join(user_id, &name).await?;
    Ok(Redirect::to(&room_path(&joined.room_name)).into_response())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn leave(
    State(membership): State<MembershipManager>,
    session: Session,
) -> AppResult<Redirect> {
    if let Some(user_id) = session::current_user(&session).await? {
        match membership.leave(user_id).await {
            Ok(_) | Err(RelayError::NotInRoom) => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(Redirect::to("/"))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn send(
    Path(name): Path<String>,
    State(router): State<MessageRouter>,
    session: Session,

    Form(SendMessageForm { message }): Form<SendMessageForm>,
) -> AppResult<Response> {
    let Some(user_id) = session::current_user(&session).await? else {
        return Ok(Redirect::to("/register").into_response());
    };

    let message = message.trim();
    if !message.is_empty() {
        router.send(user_id, &name, Payload::text(message)).await?;
    }
    Ok(Redirect::to(&room_path(&name)).into_response())
}
