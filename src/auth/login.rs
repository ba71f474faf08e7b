use axum::{debug_handler, extract::State, response::{Html, IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{debug, info};

use super::password;
use crate::{
    include_res,
    profiles::ProfileStore,
    res::escape,
    session::USER_ID,
    AppResult,
};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    nickname: String,
    password: String,
}

fn form_page(error: &str) -> Html<String> {
    Html(
        include_res!(str, "/pages/login.html")
            .replace("{error}", &escape(error))
    )
}

#[debug_handler]
pub async fn login_page() -> Html<String> {
    form_page("")
}

/// Restores the session of a web profile.
#[debug_handler(state = crate::AppState)]
pub async fn login(
    State(profiles): State<ProfileStore>,
    session: Session,

    Form(LoginForm { nickname, password }): Form<LoginForm>,
) -> AppResult<Response> {
    let nickname = nickname.trim();
    let user_id = match profiles.login_for(nickname).await? {
        Some((user_id, stored_hash)) if password::verify(&password, &stored_hash) => user_id,
        _ => {
            debug!(nickname, "login rejected");
            return Ok(form_page("Wrong nickname or password.").into_response());
        }
    };

    session.cycle_id().await?;
    session.insert(USER_ID, user_id).await?;
    info!(user_id, nickname, "web login");

    Ok(Redirect::to("/").into_response())
}
