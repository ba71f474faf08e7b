use sqlx::SqlitePool;
use tracing::debug;

use crate::{
    db::User,
    error::{is_unique_violation, RelayError},
};

/// Web-registered users get ids above this floor so they never collide with
/// bot platform account ids handed out in the low range.
const WEB_ID_FLOOR: i64 = 100_000;

/// A user currently sitting in a room.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Occupant {
    pub user_id: i64,
    pub nickname: String,
}

#[derive(Clone)]
pub struct ProfileStore {
    db_pool: SqlitePool,
}

impl ProfileStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn get_by_external_id(&self, user_id: i64) -> Result<Option<User>, RelayError> {
        Ok(
            sqlx::query_as("SELECT user_id,nickname,age,gender,bio,current_room FROM users WHERE user_id=?")
                .bind(user_id)
                .fetch_optional(&self.db_pool)
                .await?
        )
    }

    pub async fn get_by_nickname(&self, nickname: &str) -> Result<Option<User>, RelayError> {
        Ok(
            sqlx::query_as("SELECT user_id,nickname,age,gender,bio,current_room FROM users WHERE nickname=?")
                .bind(nickname)
                .fetch_optional(&self.db_pool)
                .await?
        )
    }

    /// Inserts the profile or overwrites the one stored under the same id.
    /// An existing profile keeps its room; only `set_room` moves users.
    /// Fails with `DuplicateNickname` when another identity holds the nickname.
    pub async fn upsert(&self, user: &User) -> Result<(), RelayError> {
        let result = sqlx::query(
            "INSERT INTO users (user_id,nickname,age,gender,bio,current_room) VALUES (?,?,?,?,?,?)
             ON CONFLICT(user_id) DO UPDATE SET
                nickname=excluded.nickname,
                age=excluded.age,
                gender=excluded.gender,
                bio=excluded.bio"
        )
            .bind(user.user_id)
            .bind(&user.nickname)
            .bind(user.age)
            .bind(user.gender)
            .bind(&user.bio)
            .bind(&user.current_room)
            .execute(&self.db_pool)
            .await;

        match result {
            Ok(_) => {
                debug!(user_id = user.user_id, nickname = %user.nickname, "profile saved");
                Ok(())
            }
            Err(err) if is_unique_violation(&err) => Err(RelayError::DuplicateNickname(user.nickname.clone())),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn set_room(&self, user_id: i64, room_name: Option<&str>) -> Result<(), RelayError> {
        sqlx::query("UPDATE users SET current_room=? WHERE user_id=?")
            .bind(room_name)
            .bind(user_id)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    pub async fn count_in_room(&self, room_name: &str) -> Result<i64, RelayError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE current_room=?")
            .bind(room_name)
            .fetch_one(&self.db_pool)
            .await?;
        Ok(count)
    }

    pub async fn list_nicknames_in_room(&self, room_name: &str) -> Result<Vec<String>, RelayError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT nickname FROM users WHERE current_room=? ORDER BY user_id")
            .bind(room_name)
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows.into_iter().map(|(nickname,)| nickname).collect())
    }

    pub async fn list_occupants(&self, room_name: &str) -> Result<Vec<Occupant>, RelayError> {
        Ok(
            sqlx::query_as("SELECT user_id,nickname FROM users WHERE current_room=? ORDER BY user_id")
                .bind(room_name)
                .fetch_all(&self.db_pool)
                .await?
        )
    }

    pub async fn list_nicknames_except(&self, nickname: &str) -> Result<Vec<String>, RelayError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT nickname FROM users WHERE nickname!=? ORDER BY nickname")
            .bind(nickname)
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows.into_iter().map(|(nickname,)| nickname).collect())
    }

    /// Stores the web login hash for a profile, replacing an older one.
    pub async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> Result<(), RelayError> {
        sqlx::query(
            "INSERT INTO web_logins (user_id,password_hash) VALUES (?,?)
             ON CONFLICT(user_id) DO UPDATE SET password_hash=excluded.password_hash"
        )
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    /// Id and login hash of the profile holding `nickname`, if it can log in on the web.
    pub async fn login_for(&self, nickname: &str) -> Result<Option<(i64, String)>, RelayError> {
        Ok(
            sqlx::query_as(
                "SELECT users.user_id,web_logins.password_hash FROM users
                 JOIN web_logins ON web_logins.user_id=users.user_id
                 WHERE users.nickname=?"
            )
                .bind(nickname)
                .fetch_optional(&self.db_pool)
                .await?
        )
    }

    pub async fn next_external_id(&self) -> Result<i64, RelayError> {
        let (max_id,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(user_id), ?) FROM users")
            .bind(WEB_ID_FLOOR)
            .fetch_one(&self.db_pool)
            .await?;
        Ok(max_id.max(WEB_ID_FLOOR) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::{test_pool, Gender}, rooms::RoomDirectory};

    #[tokio::test]
    async fn upsert_then_lookup_by_nickname() {
        let profiles = ProfileStore::new(test_pool().await);
        let alice = User {
            age: Some(30),
            gender: Some(Gender::F),
            bio: Some("hello there".to_owned()),
            ..User::new(1, "alice")
        };

        profiles.upsert(&alice).await.unwrap();

        assert_eq!(profiles.get_by_nickname("alice").await.unwrap(), Some(alice.clone()));
        assert_eq!(profiles.get_by_external_id(1).await.unwrap(), Some(alice));
        assert_eq!(profiles.get_by_nickname("bob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn nickname_held_by_other_identity_is_rejected() {
        let profiles = ProfileStore::new(test_pool().await);
        profiles.upsert(&User::new(1, "alice")).await.unwrap();

        let err = profiles.upsert(&User::new(2, "alice")).await.unwrap_err();
        assert!(matches!(err, RelayError::DuplicateNickname(nickname) if nickname == "alice"));
        assert_eq!(profiles.get_by_external_id(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn same_identity_can_edit_its_profile() {
        let profiles = ProfileStore::new(test_pool().await);
        profiles.upsert(&User::new(1, "alice")).await.unwrap();

        let edited = User { bio: Some("new bio".to_owned()), ..User::new(1, "alicia") };
        profiles.upsert(&edited).await.unwrap();

        assert_eq!(profiles.get_by_nickname("alice").await.unwrap(), None);
        assert_eq!(profiles.get_by_external_id(1).await.unwrap(), Some(edited));
    }

    #[tokio::test]
    async fn editing_a_profile_does_not_move_it() {
        let db_pool = test_pool().await;
        RoomDirectory::new(db_pool.clone()).create("Garden", "quiet").await.unwrap();
        let profiles = ProfileStore::new(db_pool);
        profiles.upsert(&User::new(1, "alice")).await.unwrap();
        profiles.set_room(1, Some("Garden")).await.unwrap();

        profiles.upsert(&User { age: Some(40), ..User::new(1, "alice") }).await.unwrap();

        let alice = profiles.get_by_external_id(1).await.unwrap().unwrap();
        assert_eq!((alice.age, alice.current_room.as_deref()), (Some(40), Some("Garden")));
    }

    #[tokio::test]
    async fn room_counts_match_nickname_lists() {
        let db_pool = test_pool().await;
        let rooms = RoomDirectory::new(db_pool.clone());
        rooms.create("Lounge", "general chat").await.unwrap();
        rooms.create("Garden", "quiet").await.unwrap();

        let profiles = ProfileStore::new(db_pool);
        for (id, nickname) in [(1, "a"), (2, "b"), (3, "c")] {
            profiles.upsert(&User::new(id, nickname)).await.unwrap();
        }
        profiles.set_room(1, Some("Lounge")).await.unwrap();
        profiles.set_room(2, Some("Lounge")).await.unwrap();
        profiles.set_room(3, Some("Garden")).await.unwrap();
        profiles.set_room(2, None).await.unwrap();

        for room in ["Lounge", "Garden", "Attic"] {
            let nicknames = profiles.list_nicknames_in_room(room).await.unwrap();
            assert_eq!(profiles.count_in_room(room).await.unwrap(), nicknames.len() as i64);
        }
        assert_eq!(profiles.list_nicknames_in_room("Lounge").await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn only_profiles_with_a_hash_can_log_in() {
        let profiles = ProfileStore::new(test_pool().await);
        profiles.upsert(&User::new(1, "bot_user")).await.unwrap();
        profiles.upsert(&User::new(100_001, "web_user")).await.unwrap();
        profiles.set_password_hash(100_001, "old").await.unwrap();
        profiles.set_password_hash(100_001, "new").await.unwrap();

        assert_eq!(profiles.login_for("bot_user").await.unwrap(), None);
        assert_eq!(profiles.login_for("web_user").await.unwrap(), Some((100_001, "new".to_owned())));
    }

    #[tokio::test]
    async fn web_ids_start_above_the_floor() {
        let profiles = ProfileStore::new(test_pool().await);
        assert_eq!(profiles.next_external_id().await.unwrap(), 100_001);

        profiles.upsert(&User::new(100_001, "web")).await.unwrap();
        assert_eq!(profiles.next_external_id().await.unwrap(), 100_002);
    }
}
