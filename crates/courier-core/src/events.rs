//! Wire events exchanged with clients.
//!
//! Every frame in both directions is a JSON envelope `{"event", "data"}`.
//! Inbound, `data` stays a raw [`Value`] until the matching handler parses
//! it; outbound, [`ServerEvent`] is serialized once and the same frame is
//! shared by every subscriber of the target room.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::ids::UserId;
use crate::model::{ConversationSummary, Message, MessageDraft, UserProfile};

// ─────────────────────────────────────────────────────────────────────────────
// Event names
// ─────────────────────────────────────────────────────────────────────────────

/// Inbound: open a conversation view with a target user.
pub const MESSAGE_PAGE: &str = "message-page";
/// Inbound: send a message.
pub const NEW_MESSAGE: &str = "new-message";
/// Inbound: list the caller's conversations.
pub const SIDEBAR: &str = "sidebar";

/// Outbound: target user's profile + presence flag.
pub const MESSAGE_USER: &str = "message-user";
/// Outbound: ordered message history for a pair.
pub const MESSAGE: &str = "message";
/// Outbound: ordered conversation summaries for a user.
pub const CONVERSATION: &str = "conversation";
/// Outbound: handler failure notice to the originating connection.
pub const ERROR: &str = "error";
/// Outbound: full snapshot of online user ids, sent to everyone.
pub const ONLINE_USER: &str = "onlineUser";

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

/// Envelope for every inbound client frame.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientEnvelope {
    /// Event name — the dispatch key.
    pub event: String,
    /// Event payload; shape depends on the event.
    #[serde(default)]
    pub data: Value,
}

/// Payload of [`NEW_MESSAGE`].
///
/// `sender`/`receiver` select the conversation pair. Clients also send a
/// `msgByUserId` field; it is ignored — the authenticated connection
/// identity is the sender of record.
#[derive(Clone, Debug, Deserialize)]
pub struct NewMessagePayload {
    /// One side of the pair (by convention the caller).
    pub sender: UserId,
    /// The other side of the pair.
    pub receiver: UserId,
    /// Message content.
    #[serde(flatten)]
    pub draft: MessageDraft,
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────────────────

/// Payload of [`MESSAGE_USER`]: public profile plus live presence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUserPayload {
    /// Target profile (null display fields for unknown users).
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Whether the target currently holds at least one open connection.
    pub online: bool,
}

/// An outbound server event, serialized as `{"event", "data"}`.
#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    /// Event name.
    pub event: &'static str,
    /// JSON payload.
    pub data: Value,
}

impl ServerEvent {
    /// [`ONLINE_USER`] with the full presence snapshot.
    #[must_use]
    pub fn online_user(ids: &[UserId]) -> Self {
        Self {
            event: ONLINE_USER,
            data: json!(ids),
        }
    }

    /// [`MESSAGE_USER`] for a resolved target.
    #[must_use]
    pub fn message_user(payload: &MessageUserPayload) -> Self {
        Self {
            event: MESSAGE_USER,
            data: json!(payload),
        }
    }

    /// [`MESSAGE`] carrying a pair's full history in append order.
    #[must_use]
    pub fn message_history(messages: &[Message]) -> Self {
        Self {
            event: MESSAGE,
            data: json!(messages),
        }
    }

    /// [`CONVERSATION`] carrying a user's summaries.
    #[must_use]
    pub fn conversations(summaries: &[ConversationSummary]) -> Self {
        Self {
            event: CONVERSATION,
            data: json!(summaries),
        }
    }

    /// [`ERROR`] with a human-readable message for the originating
    /// connection only.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            event: ERROR,
            data: json!({ "message": message.into() }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
