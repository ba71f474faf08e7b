mod page;
mod store;

use axum::{routing::get, Router};

use crate::AppState;

pub use store::{Occupant, ProfileStore};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{nickname}", get(page::profile))
}
