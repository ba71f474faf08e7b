use axum::{debug_handler, extract::Query, response::Redirect};
use serde::Deserialize;
use tower_sessions::Session;

use crate::AppResult;

#[derive(Deserialize)]
pub struct LogoutQuery {
    pub return_url: Option<String>,
}

/// Local paths only. `//host` and `/\host` are read by browsers as other origins.
fn local_return_url(return_url: Option<&str>) -> &str {
    return_url
        .filter(|url| url.starts_with('/') && !url.starts_with("//") && !url.starts_with("/\\"))
        .filter(|url| url.bytes().all(|b| b.is_ascii_graphic()))
        .unwrap_or("/")
}

#[debug_handler]
pub async fn logout(
    Query(LogoutQuery { return_url }): Query<LogoutQuery>,
    session: Session
) -> AppResult<Redirect> {
    session.flush().await?;
    Ok(Redirect::to(local_return_url(return_url.as_deref())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_paths_are_followed() {
        assert_eq!(local_return_url(Some("/r/Lounge")), "/r/Lounge");
        assert_eq!(local_return_url(None), "/");
        assert_eq!(local_return_url(Some("https://evil.example")), "/");
        assert_eq!(local_return_url(Some("//evil.example")), "/");
        assert_eq!(local_return_url(Some("/\\evil.example")), "/");
        assert_eq!(local_return_url(Some("/a b")), "/");
    }
}
