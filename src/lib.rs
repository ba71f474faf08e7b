pub mod auth;
pub mod bot;
pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod mail;
pub mod profiles;
pub mod res;
pub mod rooms;
pub mod session;
pub mod transport;

use std::sync::Arc;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}, routing::get, Router};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing::error;

use bot::ConversationStore;
use config::Config;
use error::RelayError;
use mail::DirectMailbox;
use profiles::ProfileStore;
use rooms::{MembershipManager, MessageRouter, RoomDirectory};
use transport::{Transport, WsHub};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub profiles: ProfileStore,
    pub rooms: RoomDirectory,
    pub membership: MembershipManager,
    pub router: MessageRouter,
    pub mailbox: DirectMailbox,
    pub hub: WsHub,
    pub conversations: ConversationStore,
    pub transport: Arc<dyn Transport>,
}

impl AppState {
    /// Wires the stores and services together. `hub` is the websocket
    /// registry web clients attach to; `transport` is what deliveries use.
    pub fn new(db_pool: SqlitePool, config: &Config, hub: WsHub, transport: Arc<dyn Transport>) -> Self {
        let profiles = ProfileStore::new(db_pool.clone());
        let rooms = RoomDirectory::new(db_pool.clone());
        let membership = MembershipManager::new(profiles.clone(), rooms.clone(), transport.clone(), config.delivery_timeout)
            .leave_on_rejoin(config.leave_on_rejoin);
        let router = MessageRouter::new(db_pool.clone(), profiles.clone(), transport.clone(), config.delivery_timeout);
        let mailbox = DirectMailbox::new(db_pool.clone(), profiles.clone(), transport.clone(), config.delivery_timeout);

        AppState {
            db_pool,
            profiles,
            rooms,
            membership,
            router,
            mailbox,
            hub,
            conversations: ConversationStore::default(),
            transport,
        }
    }
}

pub fn app(app_state: AppState, config: &Config) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(config.session_minutes)));

    Router::new()
        .route("/", get(index::index))

        .merge(auth::router())
        .merge(mail::router())
        .nest("/r", rooms::router())
        .nest("/p", profiles::router())
        .nest("/bot", bot::router())

        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<RelayError>() {
            Some(RelayError::DuplicateNickname(_) | RelayError::DuplicateRoom(_)) => StatusCode::CONFLICT,
            Some(RelayError::UnknownRoom(_) | RelayError::UnknownRecipient(_) | RelayError::UnknownUser(_)) => StatusCode::NOT_FOUND,
            Some(RelayError::NotInRoom | RelayError::InvalidRoomName(_)) => StatusCode::BAD_REQUEST,
            Some(RelayError::Storage(_)) => StatusCode::SERVICE_UNAVAILABLE,
            None => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }

        let body = match self.0.downcast_ref::<RelayError>() {
            Some(relay_err) => relay_err.user_message(),
            None => "Something went wrong. Please try again.".to_owned(),
        };
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
