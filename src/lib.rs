//! actorhub - a small ActivityPub federation engine
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - WebFinger / host-meta / NodeInfo                         │
//! │  - Actor documents, inbox, outbox, collections              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Actor resolution, signup/login                           │
//! │  - Follow/Accept/Undo state machine                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌──────────────────────────────┐ ┌────────────────────────────┐
//! │        Federation            │ │        Data Layer           │
//! │  - acct parsing, WebFinger   │ │  - Account / Follow stores  │
//! │  - HTTP Signatures, client   │ │  - SQLite (sqlx)            │
//! └──────────────────────────────┘ └────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: The `Processor`
//! - `federation`: Addresses, keys, signatures, wire messages, client
//! - `data`: Models, store traits and the SQLite implementation
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod federation;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    pub processor: Arc<service::Processor>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database and run migrations
    /// 2. Build the federation client
    /// 3. Wire the processor to the stores
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!(path = %config.database.path.display(), "Database connected");

        let urls = federation::UrlResolver::from_config(&config.server);
        let client = Arc::new(federation::FederationClient::new(
            &config.federation,
            urls.clone(),
        )?);

        let processor = service::Processor::new(
            urls,
            client,
            db.clone(),
            db.clone(),
            &config.federation,
            &config.accounts,
        );

        tracing::info!(
            domain = %config.server.domain,
            follow_mode = ?config.federation.follow_mode,
            "Application state initialized successfully"
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            processor: Arc::new(processor),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    metrics::init_metrics();

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::wellknown_router())
        .merge(api::activitypub_router())
        .layer(axum::middleware::from_fn(api::track_http_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
