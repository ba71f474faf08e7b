use tracing::debug;

use crate::{
    db::{Gender, User},
    error::RelayError,
    transport::Payload,
    AppState,
};

use super::conversation::{Conversation, ProfileDraft};

pub const WELCOME: &str = "Hi! Welcome to the chat bot.

Here you can:
- Talk in themed rooms.
- Send text messages, pictures, audio and GIFs.
- Read other users' bios.
- Edit your own profile.

Start with /start to create your profile and join a room.";

pub const HELP: &str = "Available commands:
/start - Start using the bot
/rooms - Show the room list
/join <room> - Join a room
/create_room - Create a new room
/leave - Leave your current room
/edit_profile - Edit your profile
/bio <nickname> - Show a user's bio
/who - Show who is in your room
/message - Send a direct message
/mail - Show your direct messages
/cancel - Abort the current dialog
/help - Show this list";

/// One thing a user did in the bot chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command { name: String, args: String },
    Text(String),
    Media(Payload),
    Callback(String),
}

impl Input {
    /// Splits `/cmd@botname args` into a command; anything else is text.
    pub fn from_text(text: &str) -> Input {
        let Some(rest) = text.trim().strip_prefix('/') else {
            return Input::Text(text.to_owned());
        };
        let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let name = head.split('@').next().unwrap_or(head);
        Input::Command {
            name: name.to_lowercase(),
            args: args.trim().to_owned(),
        }
    }
}

/// Handles one input and returns the replies for the acting user.
pub async fn handle(state: &AppState, user_id: i64, input: Input) -> Vec<String> {
    match dispatch(state, user_id, input).await {
        Ok(replies) => replies,
        Err(err) => {
            debug!(user_id, %err, "bot action failed");
            vec![err.user_message()]
        }
    }
}

async fn dispatch(state: &AppState, user_id: i64, input: Input) -> Result<Vec<String>, RelayError> {
    match input {
        Input::Command { name, args } => command(state, user_id, &name, &args).await,
        Input::Callback(data) => callback(state, user_id, &data).await,
        Input::Text(text) => text_input(state, user_id, text).await,
        Input::Media(payload) => match state.conversations.get(user_id).await {
            Conversation::Idle => room_message(state, user_id, payload).await,
            _ => Ok(vec!["Please answer with text.".to_owned()]),
        },
    }
}

pub(crate) async fn room_list(state: &AppState) -> Result<String, RelayError> {
    let mut text = "Choose a room:".to_owned();
    for listing in state.rooms.list_by_occupancy().await? {
        text += &format!(
            "\n• {} ({}): {}\n  /join {}",
            listing.name, listing.occupants, listing.description, listing.name
        );
    }
    text += "\n\nCreate your own with /create_room";
    Ok(text)
}

async fn command(state: &AppState, user_id: i64, name: &str, args: &str) -> Result<Vec<String>, RelayError> {
    let conversations = &state.conversations;
    match name {
        "start" => {
            let Some(user) = state.profiles.get_by_external_id(user_id).await? else {
                conversations.set(user_id, Conversation::AwaitingNickname(ProfileDraft::default())).await;
                return Ok(vec!["Hi! Let's create your profile.\nEnter your nickname:".to_owned()]);
            };
            match user.current_room {
                Some(room_name) => Ok(vec![format!(
                    "You are already in «{room_name}». Just write a message and the other occupants will see it.\nUse /rooms to switch rooms."
                )]),
                None => Ok(vec![room_list(state).await?]),
            }
        }
        "welcome" => Ok(vec![WELCOME.to_owned()]),
        "help" => Ok(vec![HELP.to_owned()]),
        "cancel" => {
            conversations.reset(user_id).await;
            Ok(vec!["Cancelled.".to_owned()])
        }
        "rooms" => Ok(vec![room_list(state).await?]),
        "join" if args.is_empty() => Ok(vec![room_list(state).await?]),
        "join" => join(state, user_id, args).await,
        "create_room" => {
            require_profile(state, user_id).await?;
            conversations.set(user_id, Conversation::AwaitingRoomName).await;
            Ok(vec!["Enter the room name:".to_owned()])
        }
        "leave" => {
            let room_name = state.membership.leave(user_id).await?;
            Ok(vec![format!("You left «{room_name}». Use /rooms to join another room.")])
        }
        "who" => {
            let user = require_profile(state, user_id).await?;
            let room_name = user.current_room.ok_or(RelayError::NotInRoom)?;
            let nicknames = state.profiles.list_nicknames_in_room(&room_name).await?;
            Ok(vec![format!("Users in «{room_name}»:\n{}", nicknames.join("\n"))])
        }
        "bio" if args.is_empty() => Ok(vec!["Please give a nickname. Example: /bio Name".to_owned()]),
        "bio" => match state.profiles.get_by_nickname(args).await? {
            Some(User { bio: Some(bio), .. }) => Ok(vec![format!("Bio of {args}:\n{bio}")]),
            _ => Ok(vec![format!("User {args} was not found or has no bio.")]),
        },
        "edit_profile" => {
            let user = require_profile(state, user_id).await?;
            conversations.set(user_id, Conversation::AwaitingNickname(ProfileDraft::default())).await;
            Ok(vec![format!("Editing your profile.\nEnter a new nickname (or send {} to keep it):", user.nickname)])
        }
        "message" => {
            require_profile(state, user_id).await?;
            conversations.set(user_id, Conversation::AwaitingRecipient).await;
            Ok(vec!["Enter the recipient's nickname:".to_owned()])
        }
        "mail" => {
            let entries = state.mailbox.inbox_entries(user_id).await?;
            if entries.is_empty() {
                return Ok(vec!["You have no direct messages.".to_owned()]);
            }
            let listing: Vec<String> = entries
                .iter()
                .map(|entry| format!("From: {}\nMessage: {}\nTime: {}\n", entry.sender, entry.text, entry.timestamp.date()))
                .collect();
            Ok(vec![format!("Your direct messages:\n\n{}", listing.join("\n"))])
        }
        _ => Ok(vec!["Unknown command. See /help".to_owned()]),
    }
}

async fn callback(state: &AppState, user_id: i64, data: &str) -> Result<Vec<String>, RelayError> {
    if let Some(room_name) = data.strip_prefix("join_") {
        return join(state, user_id, room_name).await;
    }
    match data {
        "gender_m" => gender(state, user_id, Gender::M).await,
        "gender_f" => gender(state, user_id, Gender::F).await,
        "create_room" => command(state, user_id, "create_room", "").await,
        _ => Ok(Vec::new()),
    }
}

async fn require_profile(state: &AppState, user_id: i64) -> Result<User, RelayError> {
    state.profiles
        .get_by_external_id(user_id)
        .await?
        .ok_or(RelayError::UnknownUser(user_id))
}

async fn join(state: &AppState, user_id: i64, room_name: &str) -> Result<Vec<String>, RelayError> {
    let joined = state.membership.join(user_id, room_name).await?;
    Ok(vec![format!(
        "You are in «{}».\nRoom description: {}\nWrite messages and the other occupants will see them!\nUse /leave to leave the room.",
        joined.room_name, joined.description
    )])
}

async fn gender(state: &AppState, user_id: i64, gender: Gender) -> Result<Vec<String>, RelayError> {
    let Conversation::AwaitingGender(mut draft) = state.conversations.get(user_id).await else {
        return Ok(Vec::new());
    };
    draft.gender = Some(gender);
    state.conversations.set(user_id, Conversation::AwaitingBio(draft)).await;
    Ok(vec![format!("Gender: {}\nNow write a few words about yourself:", gender.label())])
}

async fn room_message(state: &AppState, user_id: i64, payload: Payload) -> Result<Vec<String>, RelayError> {
    let report = state.router.send_to_current(user_id, payload).await?;
    if report.no_recipients() {
        Ok(vec!["Nobody else is in this room yet.".to_owned()])
    } else {
        Ok(Vec::new())
    }
}

async fn text_input(state: &AppState, user_id: i64, text: String) -> Result<Vec<String>, RelayError> {
    let conversations = &state.conversations;
    let text = text.trim().to_owned();

    match conversations.get(user_id).await {
        Conversation::Idle => room_message(state, user_id, Payload::text(text)).await,

        Conversation::AwaitingNickname(mut draft) => {
            let taken = state.profiles
                .get_by_nickname(&text)
                .await?
                .is_some_and(|holder| holder.user_id != user_id);
            if taken || text.is_empty() {
                return Ok(vec!["That nickname is taken. Please choose another one:".to_owned()]);
            }
            draft.nickname = Some(text);
            conversations.set(user_id, Conversation::AwaitingAge(draft)).await;
            Ok(vec!["Great! Now enter your age:".to_owned()])
        }

        Conversation::AwaitingAge(mut draft) => {
            let Ok(age) = text.parse::<u8>() else {
                return Ok(vec!["Please enter a number!".to_owned()]);
            };
            draft.age = Some(age.into());
            conversations.set(user_id, Conversation::AwaitingGender(draft)).await;
            Ok(vec!["Choose your gender: reply M or F.".to_owned()])
        }

        Conversation::AwaitingGender(_) => match text.to_uppercase().as_str() {
            "M" => gender(state, user_id, Gender::M).await,
            "F" => gender(state, user_id, Gender::F).await,
            _ => Ok(vec!["Please reply M or F.".to_owned()]),
        },

        Conversation::AwaitingBio(draft) => {
            let user = User {
                user_id,
                nickname: draft.nickname.clone().unwrap_or_default(),
                age: draft.age,
                gender: draft.gender,
                bio: Some(text),
                current_room: None,
            };
            match state.profiles.upsert(&user).await {
                Ok(()) => {}
                Err(err @ RelayError::DuplicateNickname(_)) => {
                    conversations.set(user_id, Conversation::AwaitingNickname(draft)).await;
                    return Ok(vec![err.user_message()]);
                }
                Err(err) => return Err(err),
            }
            conversations.reset(user_id).await;
            Ok(vec!["Profile saved!".to_owned(), room_list(state).await?])
        }

        Conversation::AwaitingRoomName => {
            if text.is_empty() {
                return Ok(vec!["Enter the room name:".to_owned()]);
            }
            conversations.set(user_id, Conversation::AwaitingRoomDescription { name: text }).await;
            Ok(vec!["Enter the room description:".to_owned()])
        }

        Conversation::AwaitingRoomDescription { name } => match state.rooms.create(&name, &text).await {
            Ok(room) => {
                conversations.reset(user_id).await;
                Ok(vec![format!("Room «{}» created!", room.name), room_list(state).await?])
            }
            Err(err @ (RelayError::DuplicateRoom(_) | RelayError::InvalidRoomName(_))) => {
                conversations.set(user_id, Conversation::AwaitingRoomName).await;
                Ok(vec![format!("{} Enter another name:", err.user_message())])
            }
            Err(err) => Err(err),
        },

        Conversation::AwaitingRecipient => match state.profiles.get_by_nickname(&text).await? {
            Some(recipient) => {
                conversations.set(user_id, Conversation::AwaitingMessageText {
                    recipient_id: recipient.user_id,
                    recipient: recipient.nickname,
                }).await;
                Ok(vec!["Enter the message text:".to_owned()])
            }
            None => Ok(vec!["No user with that nickname was found. Enter a valid nickname:".to_owned()]),
        },

        Conversation::AwaitingMessageText { recipient_id, recipient } => {
            state.mailbox.send(user_id, recipient_id, &text).await?;
            conversations.reset(user_id).await;
            Ok(vec![format!("Message sent to {recipient}!")])
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::Config,
        db::test_pool,
        transport::{testing::RecordingTransport, Attachment, WsHub},
    };

    async fn setup() -> (AppState, Arc<RecordingTransport>) {
        let db_pool = test_pool().await;
        let transport = Arc::new(RecordingTransport::default());
        let state = AppState::new(db_pool, &Config::default(), WsHub::new(), transport.clone());
        state.rooms.seed(&[("Lounge", "general chat"), ("About life", "anything")]).await.unwrap();
        (state, transport)
    }

    async fn say(state: &AppState, user_id: i64, text: &str) -> Vec<String> {
        handle(state, user_id, Input::from_text(text)).await
    }

    async fn register(state: &AppState, user_id: i64, nickname: &str) {
        say(state, user_id, "/start").await;
        say(state, user_id, nickname).await;
        say(state, user_id, "25").await;
        handle(state, user_id, Input::Callback("gender_f".to_owned())).await;
        say(state, user_id, &format!("I am {nickname}")).await;
    }

    #[test]
    fn commands_are_split_from_text() {
        assert_eq!(Input::from_text("/join@relay_bot About life"), Input::Command {
            name: "join".to_owned(),
            args: "About life".to_owned(),
        });
        assert_eq!(Input::from_text("/WHO"), Input::Command { name: "who".to_owned(), args: String::new() });
        assert_eq!(Input::from_text("hello /there"), Input::Text("hello /there".to_owned()));
    }

    #[tokio::test]
    async fn registration_walks_through_every_field() {
        let (state, _) = setup().await;

        assert!(say(&state, 1, "/start").await[0].contains("nickname"));
        assert!(say(&state, 1, "alice").await[0].contains("age"));
        assert_eq!(say(&state, 1, "old").await, vec!["Please enter a number!"]);
        say(&state, 1, "30").await;
        assert!(say(&state, 1, "f").await[0].starts_with("Gender: Female"));
        let replies = say(&state, 1, "likes tea").await;
        assert_eq!(replies[0], "Profile saved!");
        assert!(replies[1].contains("/join Lounge"));

        let alice = state.profiles.get_by_nickname("alice").await.unwrap().unwrap();
        assert_eq!((alice.user_id, alice.age, alice.gender), (1, Some(30), Some(Gender::F)));
        assert_eq!(alice.bio.as_deref(), Some("likes tea"));
        assert_eq!(state.conversations.get(1).await, Conversation::Idle);
    }

    #[tokio::test]
    async fn taken_nickname_is_asked_again() {
        let (state, _) = setup().await;
        register(&state, 1, "alice").await;

        say(&state, 2, "/start").await;
        assert!(say(&state, 2, "alice").await[0].contains("taken"));
        assert!(matches!(state.conversations.get(2).await, Conversation::AwaitingNickname(_)));
    }

    #[tokio::test]
    async fn conversations_do_not_leak_between_users() {
        let (state, _) = setup().await;
        register(&state, 1, "alice").await;

        say(&state, 2, "/start").await;
        say(&state, 1, "/message").await;

        assert!(matches!(state.conversations.get(2).await, Conversation::AwaitingNickname(_)));
        assert_eq!(state.conversations.get(1).await, Conversation::AwaitingRecipient);
    }

    #[tokio::test]
    async fn room_chat_through_the_bot() {
        let (state, transport) = setup().await;
        register(&state, 1, "A").await;
        register(&state, 2, "B").await;

        assert_eq!(say(&state, 1, "hi").await, vec![RelayError::NotInRoom.user_message()]);

        say(&state, 1, "/join Lounge").await;
        assert_eq!(say(&state, 1, "anyone?").await, vec!["Nobody else is in this room yet."]);

        handle(&state, 2, Input::Callback("join_Lounge".to_owned())).await;
        assert!(transport.texts_to(1).await[0].starts_with("B joined «Lounge»"));

        assert!(say(&state, 1, "hi").await.is_empty());
        assert_eq!(transport.texts_to(2).await, vec!["[Lounge] A: hi"]);

        let replies = say(&state, 2, "/who").await;
        assert_eq!(replies, vec!["Users in «Lounge»:\nA\nB"]);

        handle(&state, 1, Input::Media(Payload::Image(Attachment::new("pic")))).await;
        assert_eq!(transport.sent_to(2).await.len(), 2);

        assert_eq!(say(&state, 2, "/leave").await, vec!["You left «Lounge». Use /rooms to join another room."]);
        assert_eq!(say(&state, 2, "/leave").await, vec![RelayError::NotInRoom.user_message()]);
    }

    #[tokio::test]
    async fn creating_a_room_through_the_dialog() {
        let (state, _) = setup().await;
        register(&state, 1, "alice").await;

        say(&state, 1, "/create_room").await;
        say(&state, 1, "Lounge").await;
        let replies = say(&state, 1, "taken anyway").await;
        assert!(replies[0].contains("already exists"));
        assert_eq!(state.conversations.get(1).await, Conversation::AwaitingRoomName);

        say(&state, 1, "Garden").await;
        let replies = say(&state, 1, "quiet place").await;
        assert_eq!(replies[0], "Room «Garden» created!");
        assert_eq!(state.rooms.describe("Garden").await.unwrap().as_deref(), Some("quiet place"));
    }

    #[tokio::test]
    async fn direct_messages_and_mail() {
        let (state, transport) = setup().await;
        register(&state, 1, "alice").await;
        register(&state, 2, "bob").await;

        say(&state, 1, "/message").await;
        assert!(say(&state, 1, "nobody").await[0].contains("No user"));
        say(&state, 1, "bob").await;
        assert_eq!(say(&state, 1, "hello").await, vec!["Message sent to bob!"]);

        assert_eq!(transport.texts_to(2).await.last().map(String::as_str), Some("Direct message from alice:\nhello"));

        let mail = say(&state, 2, "/mail").await;
        assert!(mail[0].contains("From: alice\nMessage: hello"));
        assert_eq!(say(&state, 1, "/mail").await, vec!["You have no direct messages."]);
    }

    #[tokio::test]
    async fn editing_keeps_the_room() {
        let (state, _) = setup().await;
        register(&state, 1, "alice").await;
        say(&state, 1, "/join Lounge").await;

        say(&state, 1, "/edit_profile").await;
        say(&state, 1, "alice").await;
        say(&state, 1, "31").await;
        say(&state, 1, "F").await;
        say(&state, 1, "new bio").await;

        let alice = state.profiles.get_by_external_id(1).await.unwrap().unwrap();
        assert_eq!(alice.age, Some(31));
        assert_eq!(alice.current_room.as_deref(), Some("Lounge"));
        assert_eq!(say(&state, 3, "/bio alice").await, vec!["Bio of alice:\nnew bio"]);
    }

    #[tokio::test]
    async fn joining_during_an_edit_sticks() {
        let (state, _) = setup().await;
        register(&state, 1, "alice").await;
        say(&state, 1, "/join Lounge").await;

        say(&state, 1, "/edit_profile").await;
        say(&state, 1, "alice").await;
        say(&state, 1, "/join About life").await;
        say(&state, 1, "31").await;
        say(&state, 1, "M").await;
        say(&state, 1, "moved").await;

        let alice = state.profiles.get_by_external_id(1).await.unwrap().unwrap();
        assert_eq!(alice.current_room.as_deref(), Some("About life"));
        assert_eq!(alice.gender, Some(Gender::M));
    }

    #[tokio::test]
    async fn commands_need_a_profile() {
        let (state, _) = setup().await;
        assert_eq!(say(&state, 9, "/message").await, vec![RelayError::UnknownUser(9).user_message()]);
        assert_eq!(say(&state, 9, "/nope").await, vec!["Unknown command. See /help"]);
    }
}
