/**
 * Application State Management
 *
 * `AppState` is the central state container handed to every Axum handler
 * and to each WebSocket connection task. It owns the database pool, the
 * presence registry, the group router, and the server configuration.
 *
 * The registry and router are created here, once per server process, and
 * live exactly as long as the state does. All access to the shared
 * connection maps goes through their methods; no call site touches the
 * underlying maps directly.
 *
 * `FromRef` implementations let handlers extract just the piece of state
 * they need, following Axum's recommended pattern.
 */

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::realtime::presence::PresenceRegistry;
use crate::realtime::router::GroupRouter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,

    /// Live-connection map per user; authority for online/offline
    /// transitions
    pub presence: Arc<PresenceRegistry>,

    /// Per-conversation broadcast groups
    pub router: Arc<GroupRouter>,

    /// Configuration loaded at startup (carries the token secret used by
    /// both the REST middleware and the WebSocket handshake)
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, config: ServerConfig) -> Self {
        Self {
            pool,
            presence: Arc::new(PresenceRegistry::new()),
            router: Arc::new(GroupRouter::new()),
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.pool.clone()
    }
}

impl FromRef<AppState> for Arc<PresenceRegistry> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.presence.clone()
    }
}

impl FromRef<AppState> for Arc<GroupRouter> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.router.clone()
    }
}

impl FromRef<AppState> for Arc<ServerConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}
