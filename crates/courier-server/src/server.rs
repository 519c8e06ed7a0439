//! `CourierServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use courier_auth::IdentityResolver;
use courier_store::{ConversationRepo, Database, UserRepo};

use crate::config::ServerConfig;
use crate::events::registry::EventRegistry;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::ws::presence::PresenceRegistry;
use crate::ws::rooms::RoomRegistry;
use crate::ws::session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Connection rooms for event fan-out.
    pub rooms: Arc<RoomRegistry>,
    /// Online-user set.
    pub presence: Arc<PresenceRegistry>,
    /// Inbound event dispatch table.
    pub registry: Arc<EventRegistry>,
    /// Credential resolution for new connections.
    pub resolver: Arc<dyn IdentityResolver>,
    /// Conversation and message storage.
    pub conversations: Arc<ConversationRepo>,
    /// User directory.
    pub users: Arc<UserRepo>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus render handle for `/metrics`.
    pub metrics: PrometheusHandle,
}

/// The courier messaging server.
pub struct CourierServer {
    state: AppState,
}

impl CourierServer {
    /// Create a new server over the shared database.
    pub fn new(
        config: ServerConfig,
        db: Database,
        resolver: Arc<dyn IdentityResolver>,
        registry: EventRegistry,
        metrics: PrometheusHandle,
    ) -> Self {
        let rooms = Arc::new(RoomRegistry::new(config.max_dropped_messages));
        let state = AppState {
            config: Arc::new(config),
            rooms,
            presence: Arc::new(PresenceRegistry::new()),
            registry: Arc::new(registry),
            resolver,
            conversations: Arc::new(ConversationRepo::new(db.clone())),
            users: Arc::new(UserRepo::new(db)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics,
        };
        Self { state }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(session::ws_route))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind and serve. Returns the bound address (real port when the
    /// config asked for 0) and the serve task handle.
    pub async fn listen(
        &self,
    ) -> std::io::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "courier server listening");

        let router = self.router();
        let shutdown = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.cancelled_owned());
            if let Err(e) = serve.await {
                tracing::error!(error = %e, "server error");
            }
        });

        Ok((local_addr, handle))
    }

    /// Get the room registry.
    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.state.rooms
    }

    /// Get the presence registry.
    pub fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.state.presence
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.rooms.connection_count().await;
    let online_users = state.presence.online_count();
    Json(health::health_check(state.start_time, connections, online_users))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics)
}
