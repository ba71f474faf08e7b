use tower_sessions::Session;

pub const USER_ID: &str = "user_id";

/// Id of the logged-in web user, if any.
pub async fn current_user(session: &Session) -> Result<Option<i64>, tower_sessions::session::Error> {
    session.get::<i64>(USER_ID).await
}
