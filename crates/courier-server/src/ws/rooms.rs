//! Room registry — fan-out of server events to connections.
//!
//! Every connection lives in exactly one room, keyed by its user id, so a
//! broadcast to a user reaches all of that user's open tabs and devices.
//! Frames are serialized once per broadcast and the same `Arc<String>` is
//! handed to every recipient's send queue.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use courier_core::ServerEvent;
use courier_core::ids::{ConnectionId, UserId};

use crate::metrics::{WS_EVICTIONS_TOTAL, WS_SEND_DROPS_TOTAL};
use super::connection::ClientConnection;

/// Serialize an event to a shared frame.
///
/// Returns `None` only if serialization fails, which event payloads built
/// from our own types never do in practice.
pub fn encode(event: &ServerEvent) -> Option<Arc<String>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            warn!(event = event.event, error = %e, "failed to serialize event");
            None
        }
    }
}

/// Connections and their per-user rooms.
pub struct RoomRegistry {
    /// All live connections indexed by connection ID.
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    /// Room membership: user id to connection IDs.
    rooms: RwLock<HashMap<UserId, HashSet<ConnectionId>>>,
    /// Evict a connection once it has dropped this many frames.
    max_dropped: u64,
}

impl RoomRegistry {
    /// Create an empty registry with the given per-connection drop budget.
    pub fn new(max_dropped: u64) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
            max_dropped,
        }
    }

    /// Add a connection and join it to its user's room.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let conn_id = connection.id.clone();
        let user_id = connection.user_id.clone();
        {
            let mut conns = self.connections.write().await;
            let _ = conns.insert(conn_id.clone(), connection);
        }
        let mut rooms = self.rooms.write().await;
        let _ = rooms.entry(user_id).or_default().insert(conn_id);
    }

    /// Remove a connection and leave its user's room.
    pub async fn remove(&self, connection_id: &ConnectionId) {
        let removed = {
            let mut conns = self.connections.write().await;
            conns.remove(connection_id)
        };
        if let Some(conn) = removed {
            let mut rooms = self.rooms.write().await;
            if let Some(members) = rooms.get_mut(&conn.user_id) {
                let _ = members.remove(connection_id);
                if members.is_empty() {
                    let _ = rooms.remove(&conn.user_id);
                }
            }
        }
    }

    /// Broadcast an event to every connection.
    pub async fn broadcast_all(&self, event: &ServerEvent) {
        let Some(frame) = encode(event) else { return };
        let conns = self.connections.read().await;
        debug!(
            event = event.event,
            recipients = conns.len(),
            "broadcast event to all"
        );
        let mut evicted = Vec::new();
        for conn in conns.values() {
            self.deliver(conn, frame.clone(), &mut evicted);
        }
        drop(conns);
        self.evict(evicted).await;
    }

    /// Broadcast an event to every connection in a user's room.
    ///
    /// A room with no members is not an error; the frame is simply not
    /// delivered anywhere.
    pub async fn broadcast_user(&self, user_id: &UserId, event: &ServerEvent) {
        let Some(frame) = encode(event) else { return };
        let member_ids: Vec<ConnectionId> = {
            let rooms = self.rooms.read().await;
            rooms
                .get(user_id)
                .map(|members| members.iter().cloned().collect())
                .unwrap_or_default()
        };
        debug!(
            event = event.event,
            user_id = %user_id,
            recipients = member_ids.len(),
            "broadcast event to room"
        );
        let conns = self.connections.read().await;
        let mut evicted = Vec::new();
        for id in &member_ids {
            if let Some(conn) = conns.get(id) {
                self.deliver(conn, frame.clone(), &mut evicted);
            }
        }
        drop(conns);
        self.evict(evicted).await;
    }

    /// Ask every live connection's session loop to close.
    ///
    /// Cancels each connection's token; the session loops observe it and
    /// run their normal cleanup (room removal, presence leave).
    pub async fn close_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            conn.close();
        }
    }

    /// Number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Number of connections in a user's room.
    pub async fn room_size(&self, user_id: &UserId) -> usize {
        self.rooms
            .read()
            .await
            .get(user_id)
            .map_or(0, HashSet::len)
    }

    fn deliver(
        &self,
        conn: &Arc<ClientConnection>,
        frame: Arc<String>,
        evicted: &mut Vec<ConnectionId>,
    ) {
        if conn.send(frame) {
            return;
        }
        counter!(WS_SEND_DROPS_TOTAL).increment(1);
        if conn.drop_count() >= self.max_dropped {
            warn!(
                conn_id = %conn.id,
                user_id = %conn.user_id,
                drops = conn.drop_count(),
                "slow client exceeded drop budget, evicting"
            );
            evicted.push(conn.id.clone());
        }
    }

    async fn evict(&self, evicted: Vec<ConnectionId>) {
        for id in evicted {
            counter!(WS_EVICTIONS_TOTAL).increment(1);
            if let Some(conn) = self.connections.read().await.get(&id) {
                conn.close();
            }
            self.remove(&id).await;
        }
    }
}
