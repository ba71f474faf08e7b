use axum::{debug_handler, extract::State, response::{Html, IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{error::RelayError, include_res, res::{escape, room_path}, rooms::RoomDirectory, session, AppResult};

#[derive(Debug, Deserialize)]
pub(crate) struct NewRoomForm {
    name: String,
    #[serde(default)]
    description: String,
}

fn form_page(error: &str) -> Html<String> {
    Html(
        include_res!(str, "/pages/new_room.html")
            .replace("{error}", &escape(error))
    )
}

#[debug_handler]
pub(crate) async fn new_room_page(session: Session) -> AppResult<Response> {
    if session::current_user(&session).await?.is_none() {
        return Ok(Redirect::to("/register").into_response());
    }

    Ok(form_page("").into_response())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_room(
    State(rooms): State<RoomDirectory>,
    session: Session,

    Form(NewRoomForm { name, description }): Form<NewRoomForm>,
) -> AppResult<Response> {
    if session::current_user(&session).await?.is_none() {
        return Ok(Redirect::to("/register").into_response());
    }

    let name = name.trim();
    if name.is_empty() {
        return Ok(form_page("A room needs a name.").into_response());
    }

    match rooms.create(name, description.trim()).await {
        Ok(room) => Ok(Redirect::to(&room_path(&room.name)).into_response()),
        Err(err @ (RelayError::DuplicateRoom(_) | RelayError::InvalidRoomName(_))) => Ok(form_page(&err.user_message()).into_response()),
        Err(err) => Err(err.into()),
    }
}
