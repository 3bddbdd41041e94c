//! HTTP interface - axum router over the core queue operations.
//!
//! # Routes
//!
//! | Path | Method | Auth |
//! |------|--------|------|
//! | /health | GET | none |
//! | /api/queue | GET | none |
//! | /api/take_ticket | POST | none |
//! | /api/update_status/{ticket_id} | POST | admin + token |
//! | /api/reset_queue | POST | admin + token |
//! | /api/settings | GET | none |
//! | /api/settings | POST | admin + token |
//! | /api/session | GET | none |
//! | /api/login | POST | none |
//! | /api/logout | POST | none |

/// Session, login and settings handlers
pub mod admin;
/// Error to HTTP response mapping
pub mod error;
/// Queue handlers
pub mod queue;
/// In-memory session store and cookie helpers
pub mod session;

use crate::core::auth::AdminCredentials;
use crate::errors::Result;
use axum::routing::{get, post};
use axum::{Json, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use session::SessionStore;

/// Shared state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Browser sessions
    pub sessions: SessionStore,
    /// The admin credential
    pub admin: Arc<AdminCredentials>,
}

impl AppState {
    /// Creates the state with an empty session store.
    #[must_use]
    pub fn new(db: DatabaseConnection, admin: AdminCredentials) -> Self {
        Self {
            db,
            sessions: SessionStore::new(),
            admin: Arc::new(admin),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/queue", get(queue::get_queue))
        .route("/api/take_ticket", post(queue::take_ticket))
        .route("/api/update_status/{ticket_id}", post(queue::update_status))
        .route("/api/reset_queue", post(queue::reset_queue))
        .route(
            "/api/settings",
            get(admin::get_settings).post(admin::update_settings),
        )
        .route("/api/session", get(admin::get_session))
        .route("/api/login", post(admin::login))
        .route("/api/logout", post(admin::logout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the router on `listener` until Ctrl+C.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
