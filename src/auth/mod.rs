mod login;
mod logout;
mod password;
mod register;

use axum::{routing::get, Router};

use crate::AppState;

pub use login::{login, login_page};
pub use logout::logout;
pub use register::{register, register_page};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", get(register::register_page).post(register::register))
        .route("/login", get(login::login_page).post(login::login))
        .route("/logout", get(logout::logout))
}
