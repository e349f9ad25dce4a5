/**
 * Server Initialization
 *
 * Builds the application from loaded configuration: connects the
 * PostgreSQL pool, runs migrations, constructs the shared state with a
 * fresh presence registry and group router, and assembles the router.
 *
 * The database is required. A chat server without its store cannot
 * authorize or persist anything, so a failed connection is a startup
 * error rather than a degraded mode.
 */

use axum::Router;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::routes::create_router;
use crate::state::AppState;

/// Connect to the database, migrate, and build the application router.
pub async fn create_app(config: ServerConfig) -> Result<Router<()>, sqlx::Error> {
    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(&config.database_url).await?;
    tracing::info!("Database connection pool created successfully");

    tracing::info!("Running database migrations...");
    sqlx::migrate!().run(&pool).await?;
    tracing::info!("Database migrations completed successfully");

    let state = AppState::new(pool, config);

    Ok(create_router(state).layer(TraceLayer::new_for_http()))
}
