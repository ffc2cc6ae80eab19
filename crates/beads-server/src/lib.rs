pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod event_bus;
pub mod models;

use std::ops::Deref;
use std::sync::Arc;

use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::api::{beads, events, stream};
use crate::auth::auth_middleware;
use crate::config::Settings;
use crate::db::BeadStore;
use crate::event_bus::{
    BusError, Dispatcher, EventLedger, HttpBus, Hub, MemoryLedger, MessageBus, NoopBus, PgLedger,
};

// ============================================================================
// State wrappers
// ============================================================================

/// Bead store wrapper for state extraction
#[derive(Clone)]
pub struct Db(pub Arc<BeadStore>);

impl Deref for Db {
    type Target = BeadStore;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Live event hub wrapper for state extraction
#[derive(Clone)]
pub struct Broadcaster(pub Arc<Hub>);

impl Deref for Broadcaster {
    type Target = Arc<Hub>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Publish dispatcher wrapper for state extraction
#[derive(Clone)]
pub struct Publisher(pub Arc<Dispatcher>);

impl Deref for Publisher {
    type Target = Dispatcher;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Durable ledger wrapper for state extraction
#[derive(Clone)]
pub struct Ledger(pub Arc<dyn EventLedger>);

impl Deref for Ledger {
    type Target = dyn EventLedger;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum BeadsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] tokio_postgres::Error),

    #[error("Message bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, BeadsError>;

impl BeadsError {
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            BeadsError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BeadsError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BeadsError::Bus(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BeadsError::NotFound(_) => StatusCode::NOT_FOUND,
            BeadsError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            BeadsError::Conflict(_) => StatusCode::CONFLICT,
            BeadsError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ============================================================================
// Application state
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub settings: Settings,
    pub hub: Arc<Hub>,
    pub dispatcher: Arc<Dispatcher>,
    pub ledger: Arc<dyn EventLedger>,
}

impl AppState {
    /// Connect the sinks described by `settings` and assemble the state.
    pub async fn connect(settings: Settings) -> Result<Self> {
        let ledger: Arc<dyn EventLedger> = match settings.database_url.as_deref() {
            Some(url) if !url.is_empty() => {
                info!("Connecting durable event ledger...");
                let ledger = PgLedger::connect(url).await?;
                ledger.migrate().await?;
                Arc::new(ledger)
            }
            _ => {
                info!("No database_url configured, using in-memory event ledger");
                Arc::new(MemoryLedger::new())
            }
        };

        let bus: Arc<dyn MessageBus> = match settings.bus_url.as_deref() {
            Some(url) if !url.is_empty() => {
                info!(bus_url = %url, "Publishing to external message bus");
                Arc::new(HttpBus::new(url, settings.dispatch.sink_timeout())?)
            }
            _ => Arc::new(NoopBus),
        };

        Ok(Self::from_parts(settings, ledger, bus))
    }

    /// Assemble the state around already constructed sinks.
    pub fn from_parts(
        settings: Settings,
        ledger: Arc<dyn EventLedger>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        let hub = Arc::new(Hub::new(settings.hub.clone()));
        let dispatcher = Arc::new(
            Dispatcher::new(ledger.clone(), bus, hub.clone())
                .with_sink_timeout(settings.dispatch.sink_timeout()),
        );

        Self {
            db: Db(Arc::new(BeadStore::new())),
            settings,
            hub,
            dispatcher,
            ledger,
        }
    }
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for Settings {
    fn from_ref(state: &AppState) -> Self {
        state.settings.clone()
    }
}

impl FromRef<AppState> for Broadcaster {
    fn from_ref(state: &AppState) -> Self {
        Broadcaster(state.hub.clone())
    }
}

impl FromRef<AppState> for Publisher {
    fn from_ref(state: &AppState) -> Self {
        Publisher(state.dispatcher.clone())
    }
}

impl FromRef<AppState> for Ledger {
    fn from_ref(state: &AppState) -> Self {
        Ledger(state.ledger.clone())
    }
}

// ============================================================================
// Router
// ============================================================================

async fn health_check() -> Response {
    Json(json!({"status": "ok"})).into_response()
}

pub fn router(state: AppState) -> Router {
    let settings = state.settings.clone();

    Router::new()
        // Health check
        .route("/api", get(health_check))
        // Bead routes
        .route("/api/beads", get(beads::list_beads).post(beads::create_bead))
        .route("/api/beads/ready", get(beads::ready_beads))
        .route(
            "/api/beads/:bead_id",
            get(beads::get_bead)
                .patch(beads::update_bead)
                .delete(beads::delete_bead),
        )
        .route("/api/beads/:bead_id/close", post(beads::close_bead))
        .route("/api/beads/:bead_id/reopen", post(beads::reopen_bead))
        .route("/api/beads/:bead_id/labels", post(beads::add_label))
        .route("/api/beads/:bead_id/labels/:label", delete(beads::remove_label))
        .route(
            "/api/beads/:bead_id/dependencies",
            get(beads::list_dependencies).post(beads::add_dependency),
        )
        .route(
            "/api/beads/:bead_id/dependencies/:depends_on",
            delete(beads::remove_dependency),
        )
        .route(
            "/api/beads/:bead_id/comments",
            get(beads::list_comments).post(beads::add_comment),
        )
        // Event routes
        .route("/api/events", get(events::query_events))
        .route("/api/events/stats", get(events::hub_stats))
        .route("/api/events/stream", get(stream::stream_events))
        .layer(axum::middleware::from_fn_with_state(settings, auth_middleware))
        .with_state(state)
}
