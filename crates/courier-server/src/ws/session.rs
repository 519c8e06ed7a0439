//! WebSocket session lifecycle — handles a single connected client from
//! upgrade through disconnect.
//!
//! Authentication runs before the upgrade: a connection attempt with a
//! missing or bad token is refused with 401 and never subscribes to
//! anything. Once upgraded, the session joins its user's room and presence,
//! broadcasts the fresh online snapshot to everyone, then loops over
//! inbound frames until the transport closes, the client goes quiet past
//! the pong timeout, the server evicts it, or shutdown begins.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use courier_core::{ClientEnvelope, ServerEvent, UserIdentity};
use courier_core::ids::ConnectionId;

use crate::events::context::EventContext;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::server::AppState;
use super::connection::ClientConnection;

/// Query parameters accepted by the `/ws` route.
///
/// Browser WebSocket clients cannot set request headers, so the credential
/// travels as a query parameter.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Opaque connection credential.
    #[serde(default)]
    pub token: Option<String>,
}

/// GET `/ws` — authenticate, then upgrade.
pub async fn ws_route(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let token = query.token.unwrap_or_default();
    let identity = match state.resolver.resolve(&token).await {
        Ok(identity) => identity,
        Err(err) => {
            // Fail closed: no subscription, no presence, no retry.
            info!(error = %err, "refusing connection");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    if state.rooms.connection_count().await >= state.config.max_connections {
        warn!(
            max_connections = state.config.max_connections,
            "connection limit reached, refusing upgrade"
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_session(socket, identity, state))
}

/// Run a WebSocket session for an authenticated client.
#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn run_session(socket: WebSocket, identity: UserIdentity, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (send_tx, mut send_rx) =
        mpsc::channel::<Arc<String>>(state.config.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(
        ConnectionId::new(),
        identity.id.clone(),
        send_tx,
    ));
    let conn_id = connection.id.clone();

    let connection_start = std::time::Instant::now();
    info!(conn_id = %conn_id, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    state.rooms.add(connection.clone()).await;
    let snapshot = state.presence.join(&identity.id);
    state
        .rooms
        .broadcast_all(&ServerEvent::online_user(&snapshot))
        .await;

    let ctx = EventContext {
        identity: identity.clone(),
        connection: connection.clone(),
        rooms: state.rooms.clone(),
        presence: state.presence.clone(),
        conversations: state.conversations.clone(),
        users: state.users.clone(),
    };

    // Outbound forwarder with periodic Ping frames.
    let outbound_conn = connection.clone();
    let ping_interval = Duration::from_secs(state.config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(state.config.heartbeat_timeout_secs);
    let outbound_closed = connection.closed();
    let outbound_shutdown = state.shutdown.token();
    let outbound = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if ws_tx.send(Message::Text(frame.as_str().into())).await.is_err() {
                                outbound_conn.close();
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                        outbound_conn.close();
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        outbound_conn.close();
                        break;
                    }
                }
                () = outbound_closed.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                () = outbound_shutdown.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Process incoming frames until the transport closes or the server
    // force-closes this connection.
    let inbound_closed = connection.closed();
    let inbound_shutdown = state.shutdown.token();
    loop {
        let msg = tokio::select! {
            next = ws_rx.next() => match next {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    debug!(error = %e, "transport error");
                    break;
                }
                None => break,
            },
            () = inbound_closed.cancelled() => break,
            () = inbound_shutdown.cancelled() => break,
        };

        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => Some(s.to_owned()),
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };

        let Some(text) = text else { continue };

        match serde_json::from_str::<ClientEnvelope>(&text) {
            Ok(envelope) => {
                state
                    .registry
                    .dispatch(&envelope.event, envelope.data, &ctx)
                    .await;
            }
            Err(e) => {
                debug!(error = %e, "unparseable client frame");
                let _ = ctx.reply(&ServerEvent::error("invalid event envelope"));
            }
        }
    }

    // Clean up: leave the room and presence, tell everyone who is left.
    info!(conn_id = %conn_id, "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection_start.elapsed().as_secs_f64());
    outbound.abort();
    state.rooms.remove(&conn_id).await;
    let snapshot = state.presence.leave(&identity.id);
    state
        .rooms
        .broadcast_all(&ServerEvent::online_user(&snapshot))
        .await;
}

#[cfg(test)]
mod tests {
    // Session behavior over a live socket (auth refusal, presence
    // broadcasts, fan-out, disconnect cleanup) is covered by the
    // integration tests in tests/integration.rs. Unit tests here cover the
    // query shape.

    use super::*;

    #[test]
    fn ws_query_parses_token() {
        let query: WsQuery = serde_json::from_str(r#"{"token":"tok-1"}"#).unwrap();
        assert_eq!(query.token.as_deref(), Some("tok-1"));
    }

    #[test]
    fn ws_query_token_optional() {
        let query: WsQuery = serde_json::from_str("{}").unwrap();
        assert!(query.token.is_none());
    }
}
