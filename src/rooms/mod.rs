mod directory;
mod fanout;
mod membership;
mod msg;
mod new;
mod room;
mod ws;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use directory::{RoomDirectory, RoomListing};
pub use fanout::{fan_out, DeliveryPolicy, EvictUnreachable, FanOutReport, LogOnly};
pub use membership::{Joined, Membership, MembershipManager};
pub use msg::{HistoryEntry, MessageRouter, SendReport};

/// Names taken by the fixed routes below; a room under one of them would be unreachable.
pub const RESERVED_ROOM_NAMES: [&str; 3] = ["new", "leave", "ws"];

/// Number of stored messages shown when opening a room.
pub const HISTORY_LIMIT: i64 = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/new", get(new::new_room_page).post(new::new_room))
        .route("/leave", post(room::leave))
        .route("/ws", get(ws::room_ws))
        .route("/{name}", get(room::room))
        .route("/{name}/messages", get(room::messages))
        .route("/{name}/join", post(room::join))
        .route("/{name}/send", post(room::send))
}
