//! `message-page` — open a conversation view with a target user.
//!
//! Replies to the caller alone with the target's public profile and online
//! flag (`message-user`), followed by the full message history between the
//! caller and the target (`message`). A target with no directory entry gets
//! null profile fields; a pair with no conversation gets an empty history.
//! Neither is an error.

use async_trait::async_trait;
use serde_json::Value;

use courier_core::{MessageUserPayload, ServerEvent, UserProfile};

use crate::events::context::EventContext;
use crate::events::error::EventError;
use crate::events::registry::EventHandler;
use super::expect_user_id;

/// Handler for [`courier_core::events::MESSAGE_PAGE`].
pub struct MessagePageHandler;

#[async_trait]
impl EventHandler for MessagePageHandler {
    async fn handle(&self, payload: Value, ctx: &EventContext) -> Result<(), EventError> {
        let target = expect_user_id(&payload)?;

        let profile = ctx
            .users
            .get(&target)?
            .map_or_else(|| UserProfile::unknown(target.clone()), UserProfile::from);
        let online = ctx.presence.is_online(&target);
        let _ = ctx.reply(&ServerEvent::message_user(&MessageUserPayload {
            profile,
            online,
        }));

        let history = ctx.conversations.list_messages(ctx.caller_id(), &target)?;
        let _ = ctx.reply(&ServerEvent::message_history(&history));
        Ok(())
    }
}
