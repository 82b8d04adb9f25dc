//! Control-surface handlers.
//!
//! Callers get a structured error body with the underlying cause
//! string; background-task failures stay in the logs.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use churro_core::{ChurroError, ExtractSource};
use churro_sched::{arm_watch, start_api_source, stop_api_source};

use crate::state::AppState;
use crate::upload::{fetch_and_publish, filename_from_url, stage_and_publish};

// ── Error mapping ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn error_response(err: ChurroError) -> ApiError {
    let status = match &err {
        ChurroError::InvalidSource(_) | ChurroError::Config(_) | ChurroError::Upload(_) => {
            StatusCode::BAD_REQUEST
        }
        ChurroError::Pipeline(_) | ChurroError::Cluster(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

fn not_found(what: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("{} not found", what),
        }),
    )
}

/// Resolve a drop-style source by name (or id) from the live pipeline.
async fn resolve_drop_source(state: &AppState, key: &str) -> Result<ExtractSource, ApiError> {
    let pipeline = state.pipeline.fetch().await.map_err(error_response)?;
    pipeline
        .sources
        .values()
        .find(|s| !s.scheme.is_api() && (s.name == key || s.id == key))
        .cloned()
        .ok_or_else(|| not_found(&format!("drop-style source '{}'", key)))
}

// ── Ping ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PingRequest {
    #[serde(default)]
    pub backpressure: bool,
}

#[derive(Serialize)]
pub struct PingResponse {
    pub backpressure: bool,
    pub uptime_seconds: u64,
}

pub async fn ping(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PingRequest>,
) -> Json<PingResponse> {
    Json(PingResponse {
        backpressure: req.backpressure,
        uptime_seconds: state.uptime_seconds(),
    })
}

// ── Source CRUD ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct WatchInfo {
    pub dir: String,
    pub source: String,
}

pub async fn list_sources(State(state): State<Arc<AppState>>) -> Json<Vec<WatchInfo>> {
    let watches = state
        .watches
        .snapshot()
        .into_iter()
        .map(|(dir, source)| WatchInfo {
            dir: dir.display().to_string(),
            source,
        })
        .collect();
    Json(watches)
}

#[derive(Serialize)]
pub struct CreateSourcesResponse {
    /// Watches newly armed by this call.
    pub armed: usize,
    /// Total directories under watch afterwards.
    pub watched: usize,
    /// Sources that failed to arm, as `name: cause` strings.
    pub failures: Vec<String>,
}

/// Re-scan configured sources and re-arm watches. Already-armed
/// directories are skipped, so repeated calls converge instead of
/// stacking duplicate watch tasks. A source that fails to arm is
/// reported and skipped; it never blocks the remaining sources.
pub async fn create_sources(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CreateSourcesResponse>, ApiError> {
    let pipeline = state.pipeline.fetch().await.map_err(error_response)?;

    let mut armed = 0;
    let mut failures = Vec::new();
    for source in pipeline.sources.values().filter(|s| !s.scheme.is_api()) {
        match arm_watch(source, state.queue_tx.clone(), &state.watches) {
            Ok(true) => {
                info!(source = %source.name, dir = %source.path, "watch armed");
                armed += 1;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(source = %source.name, "cannot arm watch: {}", e);
                failures.push(format!("{}: {}", source.name, e));
            }
        }
    }

    Ok(Json(CreateSourcesResponse {
        armed,
        watched: state.watches.len(),
        failures,
    }))
}

#[derive(Serialize)]
pub struct DeleteSourceResponse {
    pub name: String,
    /// Watch teardown is not implemented; the armed watch outlives the
    /// source definition until the process restarts.
    pub torn_down: bool,
}

pub async fn delete_source(
    Path(name): Path<String>,
) -> Result<Json<DeleteSourceResponse>, ApiError> {
    if name.trim().is_empty() {
        return Err(error_response(ChurroError::InvalidSource(
            "source name is blank".into(),
        )));
    }
    warn!(source = %name, "delete requested; watch teardown not implemented");
    Ok(Json(DeleteSourceResponse {
        name,
        torn_down: false,
    }))
}

// ── API-source lifecycle ──────────────────────────────────────

#[derive(Serialize)]
pub struct StartApiResponse {
    pub worker_name: String,
    pub extract_log_id: String,
}

pub async fn start_api(
    State(state): State<Arc<AppState>>,
    Path((pipeline_id, source_id)): Path<(String, String)>,
) -> Result<Json<StartApiResponse>, ApiError> {
    let pipeline = state.pipeline.fetch().await.map_err(error_response)?;
    if pipeline.name != pipeline_id {
        return Err(not_found(&format!("pipeline '{}'", pipeline_id)));
    }

    let launched = start_api_source(
        state.cluster.as_ref(),
        &state.launch_cfg(),
        &pipeline,
        &source_id,
    )
    .await
    .map_err(error_response)?;

    Ok(Json(StartApiResponse {
        worker_name: launched.worker_name,
        extract_log_id: launched.extract_log_id,
    }))
}

#[derive(Serialize)]
pub struct StopApiResponse {
    /// False when no worker existed (a successful no-op).
    pub stopped: bool,
}

pub async fn stop_api(
    State(state): State<Arc<AppState>>,
    Path((pipeline_id, source_id)): Path<(String, String)>,
) -> Result<Json<StopApiResponse>, ApiError> {
    let pipeline = state.pipeline.fetch().await.map_err(error_response)?;
    if pipeline.name != pipeline_id {
        return Err(not_found(&format!("pipeline '{}'", pipeline_id)));
    }
    let source = pipeline
        .source_by_id(&source_id)
        .ok_or_else(|| not_found(&format!("source '{}'", source_id)))?;

    let stopped = stop_api_source(state.cluster.as_ref(), &source.name)
        .await
        .map_err(error_response)?;
    Ok(Json(StopApiResponse { stopped }))
}

// ── Uploads ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UploadParams {
    pub filename: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub path: String,
    pub bytes: u64,
}

/// Streamed upload into a source's watched directory, via staging.
/// Client disconnects abort between chunks and leave nothing outside
/// `ready/`.
pub async fn upload_stream(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<UploadParams>,
    body: Body,
) -> Result<Json<UploadResponse>, ApiError> {
    let source = resolve_drop_source(&state, &name).await?;
    let dir = std::path::PathBuf::from(&source.path);

    let (path, bytes) = stage_and_publish(&dir, &params.filename, body.into_data_stream())
        .await
        .map_err(error_response)?;

    info!(source = %source.name, path = %path.display(), bytes, "stream upload published");
    Ok(Json(UploadResponse {
        path: path.display().to_string(),
        bytes,
    }))
}

#[derive(Deserialize)]
pub struct UploadByUrlRequest {
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
}

pub async fn upload_by_url(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<UploadByUrlRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    let source = resolve_drop_source(&state, &name).await?;
    let dir = std::path::PathBuf::from(&source.path);

    let filename = match req.filename {
        Some(f) => f,
        None => filename_from_url(&req.url).map_err(error_response)?,
    };

    let (path, bytes) = fetch_and_publish(&state.http, &dir, &filename, &req.url)
        .await
        .map_err(error_response)?;

    info!(source = %source.name, url = %req.url, path = %path.display(), "url upload published");
    Ok(Json(UploadResponse {
        path: path.display().to_string(),
        bytes,
    }))
}
