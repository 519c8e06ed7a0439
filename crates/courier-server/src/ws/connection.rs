//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use courier_core::ids::{ConnectionId, UserId};

/// A single connected WebSocket client, bound to its authenticated user.
///
/// The user is fixed at construction: authentication completes before the
/// upgrade, so a connection never exists in an anonymous state.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// The authenticated user this connection belongs to.
    pub user_id: UserId,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has responded to the last ping.
    pub is_alive: AtomicBool,
    /// When the last Pong (or any activity) was received.
    last_pong: Mutex<Instant>,
    /// Count of messages dropped due to full channel.
    pub dropped_messages: AtomicU64,
    /// Cancelled when the server force-closes this connection.
    cancel: CancellationToken,
}

impl ClientConnection {
    /// Create a new connection for an authenticated user.
    pub fn new(id: ConnectionId, user_id: UserId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            user_id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Send a pre-serialized frame to the client.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Request the session loop to close this connection.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Token the session loop watches for forced closes.
    pub fn closed(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Mark the connection as alive (pong received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection() -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new(ConnectionId::from("conn_1"), UserId::from("u1"), tx);
        (conn, rx)
    }

    #[test]
    fn create_connection() {
        let (conn, _rx) = make_connection();
        assert_eq!(conn.id.as_str(), "conn_1");
        assert_eq!(conn.user_id.as_str(), "u1");
        assert!(conn.is_alive.load(Ordering::Relaxed));
        assert!(!conn.closed().is_cancelled());
    }

    #[tokio::test]
    async fn send_frame_success() {
        let (conn, mut rx) = make_connection();
        let sent = conn.send(Arc::new("hello".into()));
        assert!(sent);
        let frame = rx.recv().await.unwrap();
        assert_eq!(&**frame, "hello");
    }

    #[tokio::test]
    async fn send_to_closed_channel_returns_false() {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new(ConnectionId::from("conn_2"), UserId::from("u1"), tx);
        drop(rx);
        let sent = conn.send(Arc::new("hello".into()));
        assert!(!sent);
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn send_to_full_channel_counts_drops() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = ClientConnection::new(ConnectionId::from("conn_3"), UserId::from("u1"), tx);
        assert!(conn.send(Arc::new("msg1".into())));
        // Channel is now full
        assert!(!conn.send(Arc::new("msg2".into())));
        assert!(!conn.send(Arc::new("msg3".into())));
        assert_eq!(conn.drop_count(), 2);
    }

    #[test]
    fn mark_alive_and_check() {
        let (conn, _rx) = make_connection();
        // Initially alive
        assert!(conn.check_alive());
        // After check, no longer alive
        assert!(!conn.check_alive());
        // Mark alive again
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[test]
    fn close_cancels_token() {
        let (conn, _rx) = make_connection();
        let token = conn.closed();
        conn.close();
        assert!(token.is_cancelled());
    }

    #[test]
    fn connection_age_increases() {
        let (conn, _rx) = make_connection();
        let age1 = conn.age();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let age2 = conn.age();
        assert!(age2 > age1);
    }

    #[tokio::test]
    async fn send_multiple_frames_in_order() {
        let (conn, mut rx) = make_connection();
        for i in 0..5 {
            assert!(conn.send(Arc::new(format!("msg_{i}"))));
        }
        for i in 0..5 {
            let frame = rx.recv().await.unwrap();
            assert_eq!(&**frame, format!("msg_{i}"));
        }
    }
}
