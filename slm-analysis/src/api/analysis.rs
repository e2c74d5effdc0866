//! Analysis endpoints
//!
//! Submitting estimates or triggering analyzers stores a new snapshot per
//! property; reads always serve the most recent snapshot. The snapshots of
//! one analyze run are stored together or not at all.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analyzers::SampleAudio;
use crate::consensus::{Estimate, Property};
use crate::db::{self, AnalysisSummary, StoredAnalysis};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /samples/:sample_id/analyses/:property body
#[derive(Debug, Deserialize)]
pub struct SubmitEstimatesRequest {
    pub estimates: Vec<Estimate>,
}

/// POST /samples/:sample_id/analyze body
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub path: PathBuf,
    /// Defaults to every known property
    #[serde(default)]
    pub properties: Option<Vec<Property>>,
}

/// A property whose estimate set was rejected
#[derive(Debug, Serialize)]
pub struct PropertyFailure {
    pub property: Property,
    pub error: String,
}

/// POST /samples/:sample_id/analyze response
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub sample_id: Uuid,
    pub analyses: Vec<StoredAnalysis>,
    pub failures: Vec<PropertyFailure>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub view: Option<String>,
}

/// Summary by default, full record with `?view=full`
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnalysisView {
    Summary(AnalysisSummary),
    Full(StoredAnalysis),
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: u64,
}

fn parse_sample_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid sample id: {}", raw)))
}

fn parse_property(raw: &str) -> ApiResult<Property> {
    Ok(raw.parse::<Property>()?)
}

/// POST /samples/:sample_id/analyses/:property
pub async fn submit_estimates(
    State(state): State<AppState>,
    Path((sample_id, property)): Path<(String, String)>,
    Json(request): Json<SubmitEstimatesRequest>,
) -> ApiResult<(StatusCode, Json<StoredAnalysis>)> {
    let sample_id = parse_sample_id(&sample_id)?;
    let property = parse_property(&property)?;

    let record = state
        .orchestrator
        .engine()
        .build_analysis(property, request.estimates)?;
    let stored = db::insert_analysis(&state.db, sample_id, record).await?;

    info!(
        %sample_id,
        %property,
        confidence = ?stored.record.confidence,
        "Analysis stored from submitted estimates"
    );

    Ok((StatusCode::CREATED, Json(stored)))
}

/// POST /samples/:sample_id/analyze
pub async fn analyze_sample(
    State(state): State<AppState>,
    Path(sample_id): Path<String>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let sample_id = parse_sample_id(&sample_id)?;
    let properties = request
        .properties
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| Property::ALL.to_vec());

    let sample = SampleAudio {
        sample_id,
        path: request.path,
    };

    let outcomes = state.orchestrator.analyze(&sample, &properties).await;

    let mut records = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(%sample_id, property = %outcome.property, error = %e, "Property analysis rejected");
                failures.push(PropertyFailure {
                    property: outcome.property,
                    error: e.to_string(),
                });
            }
        }
    }

    let analyses = db::insert_analyses(&state.db, sample_id, records).await?;

    info!(
        %sample_id,
        stored = analyses.len(),
        failed = failures.len(),
        "Sample analysis complete"
    );

    Ok(Json(AnalyzeResponse {
        sample_id,
        analyses,
        failures,
    }))
}

/// GET /samples/:sample_id/analyses
pub async fn list_analyses(
    State(state): State<AppState>,
    Path(sample_id): Path<String>,
) -> ApiResult<Json<Vec<AnalysisSummary>>> {
    let sample_id = parse_sample_id(&sample_id)?;
    Ok(Json(db::current_summaries(&state.db, sample_id).await?))
}

/// GET /samples/:sample_id/analyses/:property
pub async fn get_analysis(
    State(state): State<AppState>,
    Path((sample_id, property)): Path<(String, String)>,
    Query(query): Query<ViewQuery>,
) -> ApiResult<Json<AnalysisView>> {
    let sample_id = parse_sample_id(&sample_id)?;
    let property = parse_property(&property)?;

    let full = match query.view.as_deref() {
        None | Some("summary") => false,
        Some("full") => true,
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "Unknown view '{}' (expected 'summary' or 'full')",
                other
            )))
        }
    };

    let stored = db::current_analysis(&state.db, sample_id, property)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No {} analysis for sample {}", property, sample_id))
        })?;

    let view = if full {
        AnalysisView::Full(stored)
    } else {
        AnalysisView::Summary(AnalysisSummary::from(&stored))
    };
    Ok(Json(view))
}

/// GET /samples/:sample_id/analyses/:property/history
pub async fn get_history(
    State(state): State<AppState>,
    Path((sample_id, property)): Path<(String, String)>,
) -> ApiResult<Json<Vec<StoredAnalysis>>> {
    let sample_id = parse_sample_id(&sample_id)?;
    let property = parse_property(&property)?;
    Ok(Json(db::analysis_history(&state.db, sample_id, property).await?))
}

/// DELETE /samples/:sample_id/analyses
pub async fn delete_analyses(
    State(state): State<AppState>,
    Path(sample_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let sample_id = parse_sample_id(&sample_id)?;
    let deleted = db::delete_sample_analyses(&state.db, sample_id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/samples/:sample_id/analyses",
            get(list_analyses).delete(delete_analyses),
        )
        .route(
            "/samples/:sample_id/analyses/:property",
            get(get_analysis).post(submit_estimates),
        )
        .route(
            "/samples/:sample_id/analyses/:property/history",
            get(get_history),
        )
        .route("/samples/:sample_id/analyze", post(analyze_sample))
}
