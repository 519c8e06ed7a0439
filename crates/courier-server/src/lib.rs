//! # courier-server
//!
//! The real-time core of the courier messaging service: an Axum WebSocket
//! server that authenticates each connection before upgrade, admits it into
//! a per-user room, tracks presence, dispatches inbound chat events to
//! handlers, and fans results back out to every interested connection.
//!
//! Layout:
//! - [`config`]: server configuration with env overrides
//! - [`ws`]: connections, rooms, presence, and the session loop
//! - [`events`]: the dispatch table and the three chat event handlers
//! - [`server`]: router, app state, and the listen entry point
//! - [`health`] / [`metrics`] / [`shutdown`]: the usual service plumbing

#![deny(unsafe_code)]

pub mod config;
pub mod events;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod ws;

pub use config::ServerConfig;
pub use server::{AppState, CourierServer};
