//! Per-connection context handed to every event handler.

use std::sync::Arc;

use courier_core::{ServerEvent, UserIdentity};
use courier_core::ids::UserId;
use courier_store::{ConversationRepo, UserRepo};

use crate::ws::connection::ClientConnection;
use crate::ws::presence::PresenceRegistry;
use crate::ws::rooms::{self, RoomRegistry};

/// Everything a handler can reach: the authenticated caller, its live
/// connection, the shared registries, and the store repositories.
///
/// One context exists per connection; the identity inside it never changes
/// for the connection's lifetime.
pub struct EventContext {
    /// The authenticated caller.
    pub identity: UserIdentity,
    /// The originating connection, for caller-only replies.
    pub connection: Arc<ClientConnection>,
    /// Room fan-out.
    pub rooms: Arc<RoomRegistry>,
    /// Online-user set.
    pub presence: Arc<PresenceRegistry>,
    /// Conversation and message storage.
    pub conversations: Arc<ConversationRepo>,
    /// User directory.
    pub users: Arc<UserRepo>,
}

impl EventContext {
    /// Id of the authenticated caller.
    pub fn caller_id(&self) -> &UserId {
        &self.identity.id
    }

    /// Send an event to the originating connection only.
    ///
    /// Returns `false` if the frame could not be enqueued (slow or closing
    /// client); the caller has nothing useful to do about that beyond what
    /// the room registry's drop accounting already does.
    pub fn reply(&self, event: &ServerEvent) -> bool {
        match rooms::encode(event) {
            Some(frame) => self.connection.send(frame),
            None => false,
        }
    }
}
