use axum::{debug_handler, extract::State, response::{Html, IntoResponse, Response}};
use tower_sessions::Session;

use crate::{
    include_res,
    profiles::ProfileStore,
    res::{escape, room_path},
    rooms::RoomDirectory,
    session,
    AppResult,
};

#[debug_handler(state = crate::AppState)]
pub async fn index(
    State(rooms): State<RoomDirectory>,
    State(profiles): State<ProfileStore>,
    session: Session,
) -> AppResult<Response> {
    let user = match session::current_user(&session).await? {
        Some(user_id) => profiles.get_by_external_id(user_id).await?,
        None => None,
    };

    let mut room_items = String::new();
    for listing in rooms.list_by_occupancy().await? {
        let current = user.as_ref().and_then(|user| user.current_room.as_deref()) == Some(listing.name.as_str());
        room_items += &include_res!(str, "/pages/room_item.html")
            .replace("{path}", &room_path(&listing.name))
            .replace("{name}", &escape(&listing.name))
            .replace("{description}", &escape(&listing.description))
            .replace("{occupants}", &listing.occupants.to_string())
            .replace("{current}", if current { " (you are here)" } else { "" });
    }

    let greeting = match &user {
        Some(user) => include_res!(str, "/pages/greeting.html").replace("{nickname}", &escape(&user.nickname)),
        None => include_res!(str, "/pages/anonymous.html").to_owned(),
    };

    Ok(
        Html(
            include_res!(str, "/pages/index.html")
                .replace("{greeting}", &greeting)
                .replace("{room_items}", &room_items)
        ).into_response()
    )
}
