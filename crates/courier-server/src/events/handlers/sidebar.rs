//! `sidebar` — list the caller's conversations.
//!
//! The wire payload names a user id for protocol compatibility, but the
//! summaries emitted are always the authenticated caller's own: a
//! connection can only read conversation lists it participates in.

use async_trait::async_trait;
use serde_json::Value;

use courier_core::ServerEvent;

use crate::events::context::EventContext;
use crate::events::error::EventError;
use crate::events::registry::EventHandler;

/// Handler for [`courier_core::events::SIDEBAR`].
pub struct SidebarHandler;

#[async_trait]
impl EventHandler for SidebarHandler {
    async fn handle(&self, _payload: Value, ctx: &EventContext) -> Result<(), EventError> {
        let summaries = ctx.conversations.summaries_for(ctx.caller_id())?;
        let _ = ctx.reply(&ServerEvent::conversations(&summaries));
        Ok(())
    }
}
