use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Gender {
    M,
    F,
}

impl Gender {
    pub fn label(&self) -> &'static str {
        match self {
            Gender::M => "Male",
            Gender::F => "Female",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub nickname: String,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
    pub bio: Option<String>,
    pub current_room: Option<String>,

    // unique: user_id
    // unique: nickname
}

impl User {
    pub fn new(user_id: i64, nickname: impl Into<String>) -> Self {
        User {
            user_id,
            nickname: nickname.into(),
            age: None,
            gender: None,
            bio: None,
            current_room: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Room {
    pub room_id: i64,
    pub name: String,
    pub description: String,

    // unique: name
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RoomMessage {
    pub message_id: i64,
    pub user_id: i64,
    pub room_name: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DirectMessage {
    pub message_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Rooms present on every fresh database.
pub const DEFAULT_ROOMS: [(&str, &str); 4] = [
    ("Moscow", "Chat for people living in Moscow"),
    ("Petersburg", "Chat for people from Saint Petersburg"),
    ("Dating", "Meet people and talk"),
    ("About life", "Talk about anything under the sun"),
];

const SCHEMA: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS rooms (
        room_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS users (
        user_id INTEGER PRIMARY KEY,
        nickname TEXT NOT NULL UNIQUE,
        age INTEGER,
        gender TEXT,
        bio TEXT,
        current_room TEXT REFERENCES rooms(name)
    )",
    "CREATE TABLE IF NOT EXISTS web_logins (
        user_id INTEGER PRIMARY KEY REFERENCES users(user_id),
        password_hash TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        message_id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        room_name TEXT NOT NULL,
        text TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS private_messages (
        message_id INTEGER PRIMARY KEY AUTOINCREMENT,
        sender_id INTEGER NOT NULL,
        receiver_id INTEGER NOT NULL,
        text TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )",
];

pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

pub async fn init_schema(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(db_pool).await?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let db_pool = connect("sqlite::memory:", 1).await.unwrap();
    init_schema(&db_pool).await.unwrap();
    db_pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_init_is_idempotent() {
        let db_pool = test_pool().await;
        init_schema(&db_pool).await.unwrap();

        let (tables,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('rooms','users','messages','private_messages')")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[tokio::test]
    async fn current_room_must_reference_a_room() {
        let db_pool = test_pool().await;
        let result = sqlx::query("INSERT INTO users (user_id,nickname,current_room) VALUES (1,'ghost','Nowhere')")
            .execute(&db_pool)
            .await;
        assert!(result.is_err());
    }
}
