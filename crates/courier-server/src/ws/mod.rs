//! WebSocket layer: connections, rooms, presence, and the session loop.

pub mod connection;
pub mod presence;
pub mod rooms;
pub mod session;

pub use connection::ClientConnection;
pub use presence::PresenceRegistry;
pub use rooms::RoomRegistry;
