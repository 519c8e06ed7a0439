//! # courier-core
//!
//! Shared vocabulary for the courier messaging service.
//!
//! This crate provides the types every other courier crate depends on:
//!
//! - **Branded IDs**: `UserId`, `ConversationId`, `MessageId`, `ConnectionId`
//!   as newtypes for type safety
//! - **Domain model**: `UserIdentity`, `UserProfile`, `Message`,
//!   `MessageDraft`, `Conversation`, `ConversationSummary`
//! - **Wire events**: inbound `ClientEnvelope`, outbound `ServerEvent`, and
//!   the event names shared with the browser client

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod model;

pub use events::{ClientEnvelope, MessageUserPayload, NewMessagePayload, ServerEvent};
pub use ids::{ConnectionId, ConversationId, MessageId, UserId};
pub use model::{
    Conversation, ConversationSummary, Message, MessageDraft, UserIdentity, UserProfile,
};
