//! Queue introspection: `GET /status`, `GET /queue`, `GET /queue/failed`.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use dockhand_scheduler::QueuedJob;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::ApiError;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/queue", get(pending))
        .route("/queue/failed", get(failed))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

impl ListParams {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

async fn status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = state.queue.stats().await?;
    Ok(Json(json!({
        "queue": state.queue.name(),
        "pending": stats.pending,
        "working": stats.working,
        "completed": stats.completed,
        "failed": stats.failed,
    })))
}

async fn pending(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<QueuedJob>>, ApiError> {
    Ok(Json(state.queue.peek(params.limit()).await?))
}

async fn failed(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<QueuedJob>>, ApiError> {
    Ok(Json(state.queue.failures(params.limit()).await?))
}
