//! Domain model for users, messages, conversations, and summaries.
//!
//! Field names on the wire are pinned to what the browser client already
//! consumes: Mongo-style `_id`, camelCase message fields (`imageUrl`,
//! `msgByUserId`, `createdAt`), snake_case `profile_pic`, and the summary
//! keys `unseenMsg` / `lastMsg`. Serde renames keep the Rust names idiomatic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// A verified user identity, produced by the identity resolver at handshake
/// time. Immutable for the lifetime of the connection it authenticates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Stable user id.
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Account email.
    pub email: String,
    /// Avatar reference (may be empty).
    pub profile_pic: String,
}

/// Public profile shape emitted to clients.
///
/// Lookups for an unknown user yield the echoed id with null fields rather
/// than an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User id as requested.
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Display name, if the user exists.
    pub name: Option<String>,
    /// Account email, if the user exists.
    pub email: Option<String>,
    /// Avatar reference, if the user exists.
    pub profile_pic: Option<String>,
}

impl UserProfile {
    /// Profile for an id the store does not know: the id echoes back, every
    /// display field is null.
    #[must_use]
    pub fn unknown(id: UserId) -> Self {
        Self {
            id,
            name: None,
            email: None,
            profile_pic: None,
        }
    }
}

impl From<UserIdentity> for UserProfile {
    fn from(user: UserIdentity) -> Self {
        Self {
            id: user.id,
            name: Some(user.name),
            email: Some(user.email),
            profile_pic: Some(user.profile_pic),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// An unpersisted message as supplied by a client.
///
/// At least one of the three content fields must be non-empty for the draft
/// to be sendable; an all-empty draft is dropped without a reply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageDraft {
    /// Message text.
    pub text: String,
    /// Attached image reference.
    pub image_url: String,
    /// Attached video reference.
    pub video_url: String,
}

impl MessageDraft {
    /// True when text, image, and video are all empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.image_url.is_empty() && self.video_url.is_empty()
    }
}

/// A persisted chat message.
///
/// Immutable after creation except for the `seen` flag, which nothing in the
/// current event set flips (summaries therefore count it as-is).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message id.
    #[serde(rename = "_id")]
    pub id: MessageId,
    /// Message text (empty when absent).
    pub text: String,
    /// Attached image reference (empty when absent).
    pub image_url: String,
    /// Attached video reference (empty when absent).
    pub video_url: String,
    /// Id of the sending user.
    pub msg_by_user_id: UserId,
    /// Whether the recipient has seen this message.
    pub seen: bool,
    /// Persistence-time creation timestamp.
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversations
// ─────────────────────────────────────────────────────────────────────────────

/// The durable relationship between two users holding their shared message
/// history.
///
/// The pair is unordered: a conversation between A and B is the same record
/// regardless of who sent first. The `sender`/`receiver` labels record the
/// creation-time direction and carry no further meaning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation id.
    #[serde(rename = "_id")]
    pub id: ConversationId,
    /// User who sent the first message.
    pub sender: UserId,
    /// User who received the first message.
    pub receiver: UserId,
    /// When the conversation record was created.
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Whether the given user is one of the two participants.
    #[must_use]
    pub fn involves(&self, user_id: &UserId) -> bool {
        &self.sender == user_id || &self.receiver == user_id
    }

    /// The participant other than `user_id`.
    ///
    /// Returns the sender side when `user_id` is not a participant at all,
    /// which callers are expected to have ruled out via [`Self::involves`].
    #[must_use]
    pub fn other_participant(&self, user_id: &UserId) -> &UserId {
        if &self.sender == user_id {
            &self.receiver
        } else {
            &self.sender
        }
    }
}

/// Derived per-conversation view: participants, unseen count, and the most
/// recent message. Never stored; recomputed for every request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Conversation id.
    #[serde(rename = "_id")]
    pub id: ConversationId,
    /// Profile of the creation-time sender.
    pub sender: UserProfile,
    /// Profile of the creation-time receiver.
    pub receiver: UserProfile,
    /// Count of messages in the conversation with `seen == false`,
    /// regardless of who sent them.
    pub unseen_msg: u64,
    /// The most recently appended message, or `None` for an empty
    /// conversation.
    pub last_msg: Option<Message>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str) -> Message {
        Message {
            id: MessageId::from("m1"),
            text: text.into(),
            image_url: String::new(),
            video_url: String::new(),
            msg_by_user_id: UserId::from("u1"),
            seen: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn draft_with_only_text_is_sendable() {
        let draft = MessageDraft {
            text: "hi".into(),
            ..MessageDraft::default()
        };
        assert!(!draft.is_empty());
    }

    #[test]
    fn draft_with_only_image_is_sendable() {
        let draft = MessageDraft {
            image_url: "https://cdn/pic.png".into(),
            ..MessageDraft::default()
        };
        assert!(!draft.is_empty());
    }

    #[test]
    fn blank_draft_is_empty() {
        assert!(MessageDraft::default().is_empty());
    }

    #[test]
    fn whitespace_text_counts_as_content() {
        // Parity with the client contract: any non-empty string passes.
        let draft = MessageDraft {
            text: " ".into(),
            ..MessageDraft::default()
        };
        assert!(!draft.is_empty());
    }

    #[test]
    fn message_wire_field_names() {
        let json = serde_json::to_value(message("hello")).unwrap();
        assert_eq!(json["_id"], "m1");
        assert_eq!(json["text"], "hello");
        assert_eq!(json["imageUrl"], "");
        assert_eq!(json["videoUrl"], "");
        assert_eq!(json["msgByUserId"], "u1");
        assert_eq!(json["seen"], false);
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn summary_wire_field_names() {
        let summary = ConversationSummary {
            id: ConversationId::from("c1"),
            sender: UserProfile::from(UserIdentity {
                id: UserId::from("u1"),
                name: "Ann".into(),
                email: "ann@example.com".into(),
                profile_pic: String::new(),
            }),
            receiver: UserProfile::unknown(UserId::from("u2")),
            unseen_msg: 3,
            last_msg: Some(message("latest")),
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["_id"], "c1");
        assert_eq!(json["unseenMsg"], 3);
        assert_eq!(json["lastMsg"]["text"], "latest");
        assert_eq!(json["sender"]["name"], "Ann");
        assert_eq!(json["sender"]["profile_pic"], "");
        assert_eq!(json["receiver"]["name"], serde_json::Value::Null);
    }

    #[test]
    fn unknown_profile_echoes_id_with_null_fields() {
        let profile = UserProfile::unknown(UserId::from("ghost"));
        let json = serde_json::to_value(profile).unwrap();
        assert_eq!(json["_id"], "ghost");
        assert_eq!(json["name"], serde_json::Value::Null);
        assert_eq!(json["email"], serde_json::Value::Null);
    }

    #[test]
    fn conversation_other_participant() {
        let conv = Conversation {
            id: ConversationId::new(),
            sender: UserId::from("a"),
            receiver: UserId::from("b"),
            created_at: Utc::now(),
        };
        assert!(conv.involves(&UserId::from("a")));
        assert!(!conv.involves(&UserId::from("c")));
        assert_eq!(conv.other_participant(&UserId::from("a")).as_str(), "b");
        assert_eq!(conv.other_participant(&UserId::from("b")).as_str(), "a");
    }
}
