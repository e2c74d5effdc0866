//! slm-analysis library interface
//!
//! Multi-analyzer consensus for sample library audio properties: the pure
//! consensus engine, the analyzer orchestration around it, SQLite
//! persistence of analysis snapshots and the HTTP API.

pub mod analyzers;
pub mod api;
pub mod config;
pub mod consensus;
pub mod db;
pub mod error;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::analyzers::AnalysisOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Registered analyzers plus the consensus engine
    pub orchestrator: Arc<AnalysisOrchestrator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, orchestrator: AnalysisOrchestrator) -> Self {
        Self {
            db,
            orchestrator: Arc::new(orchestrator),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::analysis_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
