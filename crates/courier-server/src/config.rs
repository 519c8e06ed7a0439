//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the courier server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections; further upgrades are
    /// refused with 503.
    pub max_connections: usize,
    /// Heartbeat ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close the connection after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Max inbound WebSocket frame size in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue depth.
    pub send_queue_capacity: usize,
    /// Disconnect a connection once this many outbound frames have been
    /// dropped on its full queue.
    pub max_dropped_messages: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024, // messages carry URLs, not blobs
            send_queue_capacity: 256,
            max_dropped_messages: 100,
        }
    }
}

impl ServerConfig {
    /// Apply `COURIER_*` environment overrides on top of `self`.
    ///
    /// Unparseable values are logged and ignored; the existing value wins.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = read_env_string("COURIER_HOST") {
            self.host = v;
        }
        if let Some(v) = read_env_u16("COURIER_PORT") {
            self.port = v;
        }
        if let Some(v) = read_env_usize("COURIER_MAX_CONNECTIONS", 1, 1_000_000) {
            self.max_connections = v;
        }
        if let Some(v) = read_env_u64("COURIER_HEARTBEAT_INTERVAL_SECS", 1, 3600) {
            self.heartbeat_interval_secs = v;
        }
        if let Some(v) = read_env_u64("COURIER_HEARTBEAT_TIMEOUT_SECS", 1, 86400) {
            self.heartbeat_timeout_secs = v;
        }
        if let Some(v) = read_env_usize("COURIER_MAX_MESSAGE_SIZE", 1024, 64 * 1024 * 1024) {
            self.max_message_size = v;
        }
        if let Some(v) = read_env_usize("COURIER_SEND_QUEUE_CAPACITY", 1, 65536) {
            self.send_queue_capacity = v;
        }
        if let Some(v) = read_env_u64("COURIER_MAX_DROPPED_MESSAGES", 1, 1_000_000) {
            self.max_dropped_messages = v;
        }
        self
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u16(name: &str) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = val.parse().ok();
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}
