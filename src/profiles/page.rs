use axum::{debug_handler, extract::{Path, State}, response::{Html, IntoResponse, Response}};

use crate::{include_res, profiles::ProfileStore, res::{self, escape, room_path}, AppResult};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn profile(
    Path(nickname): Path<String>,
    State(profiles): State<ProfileStore>,
) -> AppResult<Response> {
    let Some(user) = profiles.get_by_nickname(&nickname).await? else {
        return res::sorry("profile");
    };

    let room = match &user.current_room {
        Some(room_name) => format!(r#"<a href="{}">{}</a>"#, room_path(room_name), escape(room_name)),
        None => "not in a room".to_owned(),
    };

    Ok(Html(
        include_res!(str, "/pages/profiles/profile.html")
            .replace("{nickname}", &escape(&user.nickname))
            .replace("{age}", &user.age.map(|age| age.to_string()).unwrap_or_else(|| "?".to_owned()))
            .replace("{gender}", user.gender.map(|gender| gender.label()).unwrap_or("?"))
            .replace("{bio}", &escape(user.bio.as_deref().unwrap_or("No bio yet")))
            .replace("{room}", &room)
    ).into_response())
}
