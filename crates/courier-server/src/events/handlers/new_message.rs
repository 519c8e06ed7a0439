//! `new-message` — send a message into a pair's conversation.
//!
//! An all-empty draft (no text, image, or video) is dropped without a reply,
//! and a pair that does not include the caller is rejected. Otherwise the
//! pair's conversation is found or created, the message is
//! appended with the authenticated caller as the sender of record, and the
//! results fan out: the full history to both participants' rooms, then each
//! participant's refreshed conversation summaries to their own room.

use async_trait::async_trait;
use metrics::counter;
use serde_json::Value;

use courier_core::{NewMessagePayload, ServerEvent};

use crate::events::context::EventContext;
use crate::events::error::EventError;
use crate::events::registry::EventHandler;
use crate::metrics::MESSAGES_SENT_TOTAL;

/// Handler for [`courier_core::events::NEW_MESSAGE`].
pub struct NewMessageHandler;

#[async_trait]
impl EventHandler for NewMessageHandler {
    async fn handle(&self, payload: Value, ctx: &EventContext) -> Result<(), EventError> {
        let payload: NewMessagePayload = serde_json::from_value(payload)
            .map_err(|e| EventError::InvalidPayload(e.to_string()))?;
        if payload.draft.is_empty() {
            return Err(EventError::EmptyMessage);
        }

        // The pair comes from the client; refuse one the caller is not in,
        // or anyone could append into a stranger's conversation.
        let caller = ctx.caller_id();
        if payload.sender != *caller && payload.receiver != *caller {
            return Err(EventError::InvalidPayload(
                "message pair does not include the caller".into(),
            ));
        }

        let conversation = ctx
            .conversations
            .find_or_create(&payload.sender, &payload.receiver)?;
        let _ = ctx
            .conversations
            .append_message(&conversation.id, ctx.caller_id(), &payload.draft)?;
        counter!(MESSAGES_SENT_TOTAL).increment(1);

        let history = ctx
            .conversations
            .list_messages(&payload.sender, &payload.receiver)?;
        let history_event = ServerEvent::message_history(&history);
        ctx.rooms.broadcast_user(&payload.sender, &history_event).await;
        if payload.receiver != payload.sender {
            ctx.rooms
                .broadcast_user(&payload.receiver, &history_event)
                .await;
        }

        let sender_summaries = ctx.conversations.summaries_for(&payload.sender)?;
        ctx.rooms
            .broadcast_user(&payload.sender, &ServerEvent::conversations(&sender_summaries))
            .await;
        if payload.receiver != payload.sender {
            let receiver_summaries = ctx.conversations.summaries_for(&payload.receiver)?;
            ctx.rooms
                .broadcast_user(
                    &payload.receiver,
                    &ServerEvent::conversations(&receiver_summaries),
                )
                .await;
        }
        Ok(())
    }
}
