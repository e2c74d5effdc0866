//! Database access for slm-analysis
//!
//! Analysis records live in the shared `slm.db` in the root folder.

pub mod analysis_records;

pub use analysis_records::{
    analysis_history, current_analyses, current_analysis, current_summaries,
    delete_sample_analyses, insert_analyses, insert_analysis, insert_analysis_at,
    AnalysisSummary, StoredAnalysis,
};

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Creates the parent directory and the database file when missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url)
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create slm-analysis tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    // Append-only: re-analysis adds a snapshot, never updates one
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_records (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            sample_id TEXT NOT NULL,
            property TEXT NOT NULL,
            analyzed_at TEXT NOT NULL,
            final_value TEXT,
            confidence INTEGER,
            agreement_level TEXT NOT NULL,
            num_contributing_analyzers INTEGER NOT NULL,
            record TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_analysis_records_sample_property
        ON analysis_records (sample_id, property, seq)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (analysis_records)");

    Ok(())
}
