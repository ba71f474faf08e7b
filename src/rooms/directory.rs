use std::cmp::Reverse;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use super::RESERVED_ROOM_NAMES;
use crate::{
    db::Room,
    error::{is_unique_violation, RelayError},
};

/// A room as shown in the room list, with its live occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RoomListing {
    pub name: String,
    pub description: String,
    pub occupants: i64,
}

#[derive(Clone)]
pub struct RoomDirectory {
    db_pool: SqlitePool,
}

impl RoomDirectory {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn list(&self) -> Result<Vec<Room>, RelayError> {
        Ok(
            sqlx::query_as("SELECT room_id,name,description FROM rooms ORDER BY room_id")
                .fetch_all(&self.db_pool)
                .await?
        )
    }

    /// Rooms by descending occupancy. Ties keep creation order.
    pub async fn list_by_occupancy(&self) -> Result<Vec<RoomListing>, RelayError> {
        let mut listings: Vec<RoomListing> = sqlx::query_as(
            "SELECT rooms.name AS name, rooms.description AS description, COUNT(users.user_id) AS occupants
             FROM rooms LEFT JOIN users ON users.current_room=rooms.name
             GROUP BY rooms.room_id
             ORDER BY rooms.room_id"
        )
            .fetch_all(&self.db_pool)
            .await?;

        listings.sort_by_key(|listing| Reverse(listing.occupants));
        Ok(listings)
    }

    pub async fn create(&self, name: &str, description: &str) -> Result<Room, RelayError> {
        if name.trim().is_empty() || RESERVED_ROOM_NAMES.contains(&name) {
            return Err(RelayError::InvalidRoomName(name.to_owned()));
        }

        let result = sqlx::query_as("INSERT INTO rooms (name,description) VALUES (?,?) RETURNING room_id,name,description")
            .bind(name)
            .bind(description)
            .fetch_one(&self.db_pool)
            .await;

        match result {
            Ok(room) => {
                info!(room = name, "room created");
                Ok(room)
            }
            Err(err) if is_unique_violation(&err) => Err(RelayError::DuplicateRoom(name.to_owned())),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn describe(&self, name: &str) -> Result<Option<String>, RelayError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT description FROM rooms WHERE name=?")
            .bind(name)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row.map(|(description,)| description))
    }

    /// Inserts the given rooms unless a room with the same name exists.
    pub async fn seed(&self, rooms: &[(&str, &str)]) -> Result<(), RelayError> {
        for (name, description) in rooms {
            sqlx::query("INSERT OR IGNORE INTO rooms (name,description) VALUES (?,?)")
                .bind(name)
                .bind(description)
                .execute(&self.db_pool)
                .await?;
        }
        Ok(())
    }
}
