//! Event handler error taxonomy.
//!
//! Failures are caught at the dispatch boundary and never travel past the
//! originating connection. What the client sees depends on the variant:
//! an empty message is dropped silently, everything else becomes an
//! `error` event with a short human-readable message.

use courier_store::StoreError;

/// Failures surfaced by inbound event handlers.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// A `new-message` with no text, image, or video. Dropped without a
    /// reply; nothing is persisted and nothing is broadcast.
    #[error("empty message")]
    EmptyMessage,

    /// The event payload could not be parsed into the expected shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The store failed mid-operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EventError {
    /// Short machine-readable tag used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            EventError::EmptyMessage => "empty_message",
            EventError::InvalidPayload(_) => "invalid_payload",
            EventError::Store(_) => "store",
        }
    }

    /// Message to send to the originating connection, or `None` when the
    /// failure is dropped silently.
    ///
    /// Store failures get a generic message; internal detail stays in the
    /// server logs.
    pub fn client_message(&self) -> Option<String> {
        match self {
            EventError::EmptyMessage => None,
            EventError::InvalidPayload(detail) => Some(format!("invalid payload: {detail}")),
            EventError::Store(_) => Some("something went wrong, please try again".into()),
        }
    }
}
