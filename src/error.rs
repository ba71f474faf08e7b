use thiserror::Error;

/// Failures of the room/profile/mailbox operations.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("nickname {0} is already taken")]
    DuplicateNickname(String),

    #[error("room {0} already exists")]
    DuplicateRoom(String),

    #[error("{0:?} cannot be used as a room name")]
    InvalidRoomName(String),

    #[error("room {0} does not exist")]
    UnknownRoom(String),

    #[error("user is not in a room")]
    NotInRoom,

    #[error("recipient {0} does not exist")]
    UnknownRecipient(String),

    #[error("user {0} has no profile")]
    UnknownUser(i64),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl RelayError {
    /// Text shown to the person who triggered the failing action.
    pub fn user_message(&self) -> String {
        use RelayError::*;
        match self {
            DuplicateNickname(nickname) => format!("The nickname {nickname} is already taken. Please pick another one."),
            DuplicateRoom(name) => format!("A room named «{name}» already exists."),
            InvalidRoomName(name) => format!("«{name}» can't be used as a room name."),
            UnknownRoom(name) => format!("There is no room named «{name}»."),
            NotInRoom => "You are not in a room. Use /rooms to pick one.".to_owned(),
            UnknownRecipient(who) => format!("No user named {who} was found."),
            UnknownUser(_) => "You don't have a profile yet. Create one with /start.".to_owned(),
            Storage(_) => "Something went wrong. Please try again.".to_owned(),
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Why a single delivery to one recipient did not go through.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("user {0} has no reachable connection")]
    Unreachable(i64),

    #[error("delivery timed out")]
    Timeout,

    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
