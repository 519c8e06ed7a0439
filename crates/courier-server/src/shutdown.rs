//! Graceful shutdown coordination.
//!
//! One `CancellationToken` fans the shutdown signal out to the serve loop
//! and every session task; [`ShutdownCoordinator::drain`] additionally
//! force-closes each remaining connection through its own token and waits
//! for the room registry to empty, so presence leaves and close frames go
//! out before the process exits.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ws::rooms::RoomRegistry;

/// Default time to wait for connections to drain before giving up.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// How often to re-check the registry while draining.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Coordinates graceful shutdown across the server and its sessions.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Shut down and drain live connections.
    ///
    /// 1. Cancel the shutdown token (the serve loop and every session
    ///    watch it)
    /// 2. Close each remaining connection through its own token
    /// 3. Wait up to `timeout` for the registry to empty; connections
    ///    still registered after that are left to the runtime
    pub async fn drain(&self, rooms: &RoomRegistry, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        self.shutdown();
        rooms.close_all().await;
        info!(
            connections = rooms.connection_count().await,
            timeout_secs = timeout.as_secs(),
            "draining connections"
        );

        let drained = tokio::time::timeout(timeout, async {
            while rooms.connection_count().await > 0 {
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        })
        .await;

        if drained.is_err() {
            warn!("shutdown timed out after {timeout:?}, some connections may still be open");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
