//! Inbound event handlers.
//!
//! One handler per event name, each orchestrating the store repositories
//! and the presence registry, emitting results through the caller's
//! connection or the room registry.

pub mod message_page;
pub mod new_message;
pub mod sidebar;

use serde_json::Value;

use courier_core::events;
use courier_core::ids::UserId;

use super::error::EventError;
use super::registry::EventRegistry;

pub use message_page::MessagePageHandler;
pub use new_message::NewMessageHandler;
pub use sidebar::SidebarHandler;

/// Register every built-in event handler.
pub fn register_builtin(registry: &mut EventRegistry) {
    registry.register(events::MESSAGE_PAGE, MessagePageHandler);
    registry.register(events::NEW_MESSAGE, NewMessageHandler);
    registry.register(events::SIDEBAR, SidebarHandler);
}

/// Extract a payload that is a bare user-id string.
fn expect_user_id(payload: &Value) -> Result<UserId, EventError> {
    payload
        .as_str()
        .filter(|s| !s.is_empty())
        .map(UserId::from)
        .ok_or_else(|| EventError::InvalidPayload("expected a user id".into()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Test helpers
// ─────────────────────────────────────────────────────────────────────────────
