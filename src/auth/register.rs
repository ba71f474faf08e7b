use axum::{debug_handler, extract::State, response::{Html, IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use super::password;
use crate::{
    db::{Gender, User},
    error::RelayError,
    include_res,
    profiles::ProfileStore,
    res::escape,
    session::{self, USER_ID},
    AppResult,
};

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    nickname: String,
    #[serde(default)]
    age: String,
    #[serde(default)]
    gender: String,
    #[serde(default)]
    bio: String,
    /// Required for a new profile; left empty it keeps the current one.
    #[serde(default)]
    password: String,
}

fn form_page(error: &str, user: Option<&User>) -> Html<String> {
    let nickname = user.map(|user| user.nickname.as_str()).unwrap_or_default();
    let age = user.and_then(|user| user.age).map(|age| age.to_string()).unwrap_or_default();
    let bio = user.and_then(|user| user.bio.as_deref()).unwrap_or_default();

    Html(
        include_res!(str, "/pages/register.html")
            .replace("{error}", &escape(error))
            .replace("{nickname}", &escape(nickname))
            .replace("{age}", &age)
            .replace("{bio}", &escape(bio))
    )
}

#[debug_handler(state = crate::AppState)]
pub async fn register_page(
    State(profiles): State<ProfileStore>,
    session: Session,
) -> AppResult<Html<String>> {
    let user = match session::current_user(&session).await? {
        Some(user_id) => profiles.get_by_external_id(user_id).await?,
        None => None,
    };
    Ok(form_page("", user.as_ref()))
}

/// Creates a profile, or edits the logged-in user's one.
#[debug_handler(state = crate::AppState)]
pub async fn register(
    State(profiles): State<ProfileStore>,
    session: Session,

    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let nickname = form.nickname.trim();
    if nickname.is_empty() {
        return Ok(form_page("A nickname is required.", None).into_response());
    }

    let age = match form.age.trim() {
        "" => None,
        age => match age.parse::<i64>() {
            Ok(age) => Some(age),
            Err(_) => return Ok(form_page("Age must be a number.", None).into_response()),
        },
    };
    let gender = match form.gender.as_str() {
        "M" => Some(Gender::M),
        "F" => Some(Gender::F),
        _ => None,
    };

    let existing = match session::current_user(&session).await? {
        Some(user_id) => profiles.get_by_external_id(user_id).await?,
        None => None,
    };
    if existing.is_none() && form.password.is_empty() {
        return Ok(form_page("A password is required.", None).into_response());
    }
    let user_id = match &existing {
        Some(user) => user.user_id,
        None => profiles.next_external_id().await?,
    };

    let user = User {
        user_id,
        nickname: nickname.to_owned(),
        age,
        gender,
        bio: Some(form.bio.trim().to_owned()).filter(|bio| !bio.is_empty()),
        current_room: None,
    };

    match profiles.upsert(&user).await {
        Ok(()) => {}
        Err(err @ RelayError::DuplicateNickname(_)) => {
            return Ok(form_page(&err.user_message(), None).into_response());
        }
        Err(err) => return Err(err.into()),
    }

    if !form.password.is_empty() {
        profiles.set_password_hash(user.user_id, &password::hash(&form.password)?).await?;
    }

    session.insert(USER_ID, user.user_id).await?;
    info!(user_id = user.user_id, nickname = %user.nickname, "web profile saved");

    Ok(Redirect::to("/").into_response())
}
