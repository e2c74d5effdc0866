//! Analysis record snapshots
//!
//! Every consensus run is stored as a new row keyed by
//! `(sample_id, property, analyzed_at)`. The "current" analysis of a property
//! is the most recent snapshot; older ones remain as history.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use slm_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::consensus::{AnalysisRecord, EstimateValue, Property};

/// A persisted analysis record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnalysis {
    pub id: Uuid,
    pub sample_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: AnalysisRecord,
}

/// Lightweight view served to UIs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub property: Property,
    pub final_value: Option<EstimateValue>,
    pub confidence: Option<u8>,
}

impl From<&StoredAnalysis> for AnalysisSummary {
    fn from(stored: &StoredAnalysis) -> Self {
        Self {
            property: stored.record.property,
            final_value: stored.record.final_value.clone(),
            confidence: stored.record.confidence,
        }
    }
}

const SELECT_COLUMNS: &str = "id, sample_id, analyzed_at, record";

// Fixed-width UTC timestamps so text ordering matches time ordering
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn internal(what: &str, e: impl std::fmt::Display) -> Error {
    Error::Internal(format!("{}: {}", what, e))
}

fn stored_from_row(row: &SqliteRow) -> Result<StoredAnalysis> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id).map_err(|e| internal("Failed to parse id", e))?;

    let sample_id: String = row.get("sample_id");
    let sample_id =
        Uuid::parse_str(&sample_id).map_err(|e| internal("Failed to parse sample_id", e))?;

    let analyzed_at: String = row.get("analyzed_at");
    let analyzed_at = DateTime::parse_from_rfc3339(&analyzed_at)
        .map_err(|e| internal("Failed to parse analyzed_at", e))?
        .with_timezone(&Utc);

    let record: String = row.get("record");
    let record: AnalysisRecord = serde_json::from_str(&record)
        .map_err(|e| internal("Failed to deserialize record", e))?;

    Ok(StoredAnalysis {
        id,
        sample_id,
        analyzed_at,
        record,
    })
}

/// Store a new snapshot stamped with the current time
pub async fn insert_analysis(
    pool: &SqlitePool,
    sample_id: Uuid,
    record: AnalysisRecord,
) -> Result<StoredAnalysis> {
    insert_analysis_at(pool, sample_id, record, Utc::now()).await
}

/// Store a new snapshot with an explicit timestamp
pub async fn insert_analysis_at(
    pool: &SqlitePool,
    sample_id: Uuid,
    record: AnalysisRecord,
    analyzed_at: DateTime<Utc>,
) -> Result<StoredAnalysis> {
    let stored = StoredAnalysis {
        id: Uuid::new_v4(),
        sample_id,
        analyzed_at,
        record,
    };

    let mut tx = pool.begin().await?;
    write_snapshot(&mut tx, &stored).await?;
    tx.commit().await?;

    Ok(stored)
}

/// Store the snapshots of one analysis run atomically
///
/// Every record shares one timestamp. If any insert fails nothing from the
/// run is kept.
pub async fn insert_analyses(
    pool: &SqlitePool,
    sample_id: Uuid,
    records: Vec<AnalysisRecord>,
) -> Result<Vec<StoredAnalysis>> {
    let analyzed_at = Utc::now();
    let mut tx = pool.begin().await?;
    let mut stored = Vec::with_capacity(records.len());

    for record in records {
        let snapshot = StoredAnalysis {
            id: Uuid::new_v4(),
            sample_id,
            analyzed_at,
            record,
        };
        write_snapshot(&mut tx, &snapshot).await?;
        stored.push(snapshot);
    }

    tx.commit().await?;
    Ok(stored)
}

async fn write_snapshot(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    stored: &StoredAnalysis,
) -> Result<()> {
    let final_value = stored
        .record
        .final_value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| internal("Failed to serialize final_value", e))?;
    let record_json = serde_json::to_string(&stored.record)
        .map_err(|e| internal("Failed to serialize record", e))?;

    sqlx::query(
        r#"
        INSERT INTO analysis_records (
            id, sample_id, property, analyzed_at, final_value, confidence,
            agreement_level, num_contributing_analyzers, record
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(stored.id.to_string())
    .bind(stored.sample_id.to_string())
    .bind(stored.record.property.as_str())
    .bind(format_timestamp(stored.analyzed_at))
    .bind(final_value)
    .bind(stored.record.confidence.map(i64::from))
    .bind(stored.record.agreement_level.as_str())
    .bind(stored.record.num_contributing_analyzers as i64)
    .bind(record_json)
    .execute(&mut **tx)
    .await?;

    tracing::debug!(
        id = %stored.id,
        sample_id = %stored.sample_id,
        property = %stored.record.property,
        "Stored analysis snapshot"
    );

    Ok(())
}

/// Most recent snapshot for one property
pub async fn current_analysis(
    pool: &SqlitePool,
    sample_id: Uuid,
    property: Property,
) -> Result<Option<StoredAnalysis>> {
    let query = format!(
        "SELECT {} FROM analysis_records \
         WHERE sample_id = ? AND property = ? \
         ORDER BY analyzed_at DESC, seq DESC LIMIT 1",
        SELECT_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(sample_id.to_string())
        .bind(property.as_str())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(stored_from_row).transpose()
}

/// Most recent snapshot of every analyzed property, ordered by property
pub async fn current_analyses(pool: &SqlitePool, sample_id: Uuid) -> Result<Vec<StoredAnalysis>> {
    let query = format!(
        "SELECT {} FROM analysis_records r \
         WHERE r.sample_id = ? AND r.seq = ( \
             SELECT seq FROM analysis_records l \
             WHERE l.sample_id = r.sample_id AND l.property = r.property \
             ORDER BY l.analyzed_at DESC, l.seq DESC LIMIT 1) \
         ORDER BY r.property",
        SELECT_COLUMNS
    );
    let rows = sqlx::query(&query)
        .bind(sample_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(stored_from_row).collect()
}

/// Summaries of the current snapshots, read from the indexed columns only
pub async fn current_summaries(pool: &SqlitePool, sample_id: Uuid) -> Result<Vec<AnalysisSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT r.property, r.final_value, r.confidence
        FROM analysis_records r
        WHERE r.sample_id = ? AND r.seq = (
            SELECT seq FROM analysis_records l
            WHERE l.sample_id = r.sample_id AND l.property = r.property
            ORDER BY l.analyzed_at DESC, l.seq DESC LIMIT 1)
        ORDER BY r.property
        "#,
    )
    .bind(sample_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let property: String = row.get("property");
            let property: Property = property
                .parse()
                .map_err(|e| internal("Failed to parse property", e))?;

            let final_value: Option<String> = row.get("final_value");
            let final_value = final_value
                .map(|v| serde_json::from_str::<EstimateValue>(&v))
                .transpose()
                .map_err(|e| internal("Failed to deserialize final_value", e))?;

            let confidence: Option<i64> = row.get("confidence");
            let confidence = confidence
                .map(u8::try_from)
                .transpose()
                .map_err(|e| internal("Stored confidence out of range", e))?;

            Ok(AnalysisSummary {
                property,
                final_value,
                confidence,
            })
        })
        .collect()
}

/// All snapshots for one property, newest first
pub async fn analysis_history(
    pool: &SqlitePool,
    sample_id: Uuid,
    property: Property,
) -> Result<Vec<StoredAnalysis>> {
    let query = format!(
        "SELECT {} FROM analysis_records \
         WHERE sample_id = ? AND property = ? \
         ORDER BY analyzed_at DESC, seq DESC",
        SELECT_COLUMNS
    );
    let rows = sqlx::query(&query)
        .bind(sample_id.to_string())
        .bind(property.as_str())
        .fetch_all(pool)
        .await?;

    rows.iter().map(stored_from_row).collect()
}

/// Remove every snapshot of a sample; called when the sample is deleted
pub async fn delete_sample_analyses(pool: &SqlitePool, sample_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM analysis_records WHERE sample_id = ?")
        .bind(sample_id.to_string())
        .execute(pool)
        .await?;

    let deleted = result.rows_affected();
    if deleted > 0 {
        tracing::info!(%sample_id, deleted, "Deleted analysis snapshots");
    }
    Ok(deleted)
}
