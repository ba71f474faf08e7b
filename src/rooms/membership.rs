use std::{sync::Arc, time::Duration};

use tracing::info;

use crate::{
    db::User,
    error::RelayError,
    profiles::ProfileStore,
    transport::{Payload, Transport},
};

use super::{
    fanout::{fan_out, LogOnly},
    RoomDirectory,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    Unassigned,
    InRoom(String),
}

impl From<Option<String>> for Membership {
    fn from(current_room: Option<String>) -> Self {
        match current_room {
            Some(room_name) => Membership::InRoom(room_name),
            None => Membership::Unassigned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub room_name: String,
    pub description: String,
    pub previous_room: Option<String>,
}

fn join_notice(user: &User, room_name: &str) -> String {
    let bio = user.bio.as_deref().unwrap_or("no bio yet");
    format!("{} joined «{room_name}».\nBio: {bio}", user.nickname)
}

fn leave_notice(user: &User, room_name: &str) -> String {
    format!("{} left «{room_name}»", user.nickname)
}

/// Moves users between rooms and tells the other occupants about it.
#[derive(Clone)]
pub struct MembershipManager {
    profiles: ProfileStore,
    rooms: RoomDirectory,
    transport: Arc<dyn Transport>,
    delivery_timeout: Duration,
    leave_on_rejoin: bool,
}

impl MembershipManager {
    pub fn new(
        profiles: ProfileStore,
        rooms: RoomDirectory,
        transport: Arc<dyn Transport>,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            profiles,
            rooms,
            transport,
            delivery_timeout,
            leave_on_rejoin: false,
        }
    }

    /// When set, moving straight from one room to another also tells the
    /// old room that the user left.
    pub fn leave_on_rejoin(mut self, enabled: bool) -> Self {
        self.leave_on_rejoin = enabled;
        self
    }

    async fn profile(&self, user_id: i64) -> Result<User, RelayError> {
        self.profiles
            .get_by_external_id(user_id)
            .await?
            .ok_or(RelayError::UnknownUser(user_id))
    }

    pub async fn state(&self, user_id: i64) -> Result<Membership, RelayError> {
        Ok(self.profile(user_id).await?.current_room.into())
    }

    pub async fn join(&self, user_id: i64, room_name: &str) -> Result<Joined, RelayError> {
        let user = self.profile(user_id).await?;
        let description = self.rooms
            .describe(room_name)
            .await?
            .ok_or_else(|| RelayError::UnknownRoom(room_name.to_owned()))?;

        self.profiles.set_room(user_id, Some(room_name)).await?;
        info!(user_id, room = room_name, previous = ?user.current_room, "joined room");

        if self.leave_on_rejoin {
            if let Some(previous) = user.current_room.as_deref().filter(|previous| *previous != room_name) {
                self.notify(previous, user_id, leave_notice(&user, previous)).await?;
            }
        }
        self.notify(room_name, user_id, join_notice(&user, room_name)).await?;

        Ok(Joined {
            room_name: room_name.to_owned(),
            description,
            previous_room: user.current_room,
        })
    }

    /// Returns the room that was left.
    pub async fn leave(&self, user_id: i64) -> Result<String, RelayError> {
        let user = self.profile(user_id).await?;
        let Some(room_name) = user.current_room.clone() else {
            return Err(RelayError::NotInRoom);
        };

        self.profiles.set_room(user_id, None).await?;
        info!(user_id, room = %room_name, "left room");

        self.notify(&room_name, user_id, leave_notice(&user, &room_name)).await?;
        Ok(room_name)
    }

    async fn notify(&self, room_name: &str, except: i64, notice: String) -> Result<(), RelayError> {
        let recipients: Vec<_> = self.profiles
            .list_occupants(room_name)
            .await?
            .into_iter()
            .filter(|occupant| occupant.user_id != except)
            .collect();

        fan_out(
            self.transport.as_ref(),
            &LogOnly,
            self.delivery_timeout,
            room_name,
            &recipients,
            &Payload::text(notice),
        ).await;
        Ok(())
    }
}
