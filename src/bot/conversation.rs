use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::db::Gender;

/// Profile fields collected so far during registration or editing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDraft {
    pub nickname: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
}

/// What the bot expects next from one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Conversation {
    #[default]
    Idle,
    AwaitingNickname(ProfileDraft),
    AwaitingAge(ProfileDraft),
    AwaitingGender(ProfileDraft),
    AwaitingBio(ProfileDraft),
    AwaitingRoomName,
    AwaitingRoomDescription { name: String },
    AwaitingRecipient,
    AwaitingMessageText { recipient_id: i64, recipient: String },
}

/// Conversation state per external identity.
#[derive(Clone, Default)]
pub struct ConversationStore {
    states: Arc<Mutex<HashMap<i64, Conversation>>>,
}

impl ConversationStore {
    pub async fn get(&self, user_id: i64) -> Conversation {
        self.states.lock().await.get(&user_id).cloned().unwrap_or_default()
    }

    pub async fn set(&self, user_id: i64, conversation: Conversation) {
        let mut states = self.states.lock().await;
        if conversation == Conversation::Idle {
            states.remove(&user_id);
        } else {
            states.insert(user_id, conversation);
        }
    }

    pub async fn reset(&self, user_id: i64) {
        self.set(user_id, Conversation::Idle).await;
    }
}
