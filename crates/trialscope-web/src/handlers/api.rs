//! JSON query API.
//!
//! Each data route tries the database first. Any database error, and an
//! empty database answer where the JSON store might know more, falls back to
//! the JSON record store.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{instrument, warn};

use trialscope_common::{ApiError, EndpointComparison, TrialFilter, TrialRecord, TrialSummary};

use crate::state::SharedState;

pub const API_VERSION: &str = "1.0";

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to the PAH Clinical Trials API" }))
}

// ── Trials ──

#[instrument(skip(state))]
pub async fn list_trials(
    State(state): State<SharedState>,
    Query(filter): Query<TrialFilter>,
) -> Result<Json<Vec<TrialSummary>>, ApiError> {
    if let Some(repo) = state.trials() {
        match repo.list(&filter).await {
            Ok(rows) => return Ok(Json(rows)),
            Err(e) => warn!(error = %e, "trial listing failed, using JSON store"),
        }
    }
    let rows = state.read_store(move |store| store.list_summaries(&filter)).await?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn get_trial(
    State(state): State<SharedState>,
    Path(nct_id): Path<String>,
) -> Result<Json<TrialRecord>, ApiError> {
    if let Some(repo) = state.trials() {
        match repo.find_by_nct(&nct_id).await {
            Ok(Some(record)) => return Ok(Json(record)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, nct_id = %nct_id, "trial lookup failed, using JSON store"),
        }
    }
    state
        .read_store(move |store| store.load(&nct_id))
        .await?
        .map(Json)
        .map_err(|_| ApiError::NotFound("Trial not found".to_string()))
}

// ── Endpoints ──

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    #[serde(default = "default_include_placebo")]
    pub include_placebo: bool,
}

fn default_include_placebo() -> bool { true }

#[instrument(skip(state))]
pub async fn compare_endpoint(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Query(params): Query<CompareParams>,
) -> Result<Json<Vec<EndpointComparison>>, ApiError> {
    if let Some(repo) = state.trials() {
        match repo.compare_endpoint(&name, params.include_placebo).await {
            Ok(rows) if !rows.is_empty() => return Ok(Json(rows)),
            Ok(_) => {}
            Err(e) => warn!(error = %e, endpoint = %name, "endpoint comparison failed, using JSON store"),
        }
    }
    let query = name.clone();
    let rows = state
        .read_store(move |store| store.compare_endpoint(&query, params.include_placebo))
        .await?;
    if rows.is_empty() {
        return Err(ApiError::NotFound(format!("No data found for endpoint: {}", name)));
    }
    Ok(Json(rows))
}

// ── Health ──

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub db_type: String,
    pub trials_loaded: u64,
    pub version: String,
}

pub async fn health(State(state): State<SharedState>) -> Result<Json<HealthStatus>, ApiError> {
    let mut trials_loaded = None;
    if let Some(repo) = state.trials() {
        match repo.count().await {
            Ok(n) => trials_loaded = Some(n),
            Err(e) => warn!(error = %e, "trial count failed, using JSON store"),
        }
    }
    let trials_loaded = match trials_loaded {
        Some(n) => n,
        None => state.read_store(|store| store.count() as u64).await?,
    };

    Ok(Json(HealthStatus {
        status: "healthy".to_string(),
        db_type: state.db_type().to_string(),
        trials_loaded,
        version: API_VERSION.to_string(),
    }))
}
