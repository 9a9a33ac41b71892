//! Manual trigger: `GET /build?repo=org/name[:branch]&image=&commit=&notify=`.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use dockhand_core::Job;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new().route("/build", get(trigger_build))
}

#[derive(Debug, Deserialize)]
pub struct BuildParams {
    pub repo: Option<String>,
    pub image: Option<String>,
    pub commit: Option<String>,
    pub notify: Option<String>,
}

async fn trigger_build(
    State(state): State<AppState>,
    Query(params): Query<BuildParams>,
) -> Result<Json<Value>, ApiError> {
    let repo = params
        .repo
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| ApiError::Unprocessable("missing required param: repo".to_string()))?;

    let mut job = Job::parse_spec(&repo, &state.default_branch)?;
    job.image = params.image;
    job.commit = params.commit;
    job.notify = params.notify;
    let job = job.validated()?;

    let queued = state.queue.enqueue(&job).await?;
    info!(job = %job, delivery = %queued.id, "Build requested");

    Ok(Json(json!({
        "status": "queued",
        "id": queued.id,
        "job": job,
    })))
}

#[cfg(test)]
mod tests {
    use crate::routes::router;
    use crate::routes::test_support::{json, state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use dockhand_scheduler::{BuildQueue, MemoryQueue};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get(queue: &Arc<MemoryQueue>, uri: &str) -> axum::http::Response<Body> {
        router(state(queue.clone(), None))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_enqueues_job_with_branch() {
        let queue = Arc::new(MemoryQueue::new("builds"));

        let response = get(&queue, "/build?repo=acme/api.git:feature/login&image=acme/edge").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["status"], "queued");
        assert_eq!(body["job"]["branch"], "feature/login");

        let pending = queue.peek(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].payload,
            serde_json::json!({
                "org": "acme",
                "name": "api",
                "branch": "feature/login",
                "image": "acme/edge",
            })
        );
    }

    #[tokio::test]
    async fn test_branch_defaults() {
        let queue = Arc::new(MemoryQueue::new("builds"));

        let response = get(&queue, "/build?repo=acme/api").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["job"]["branch"], "master");
    }

    #[tokio::test]
    async fn test_missing_repo_is_422() {
        let queue = Arc::new(MemoryQueue::new("builds"));

        for uri in ["/build", "/build?repo=", "/build?image=x"] {
            let response = get(&queue, uri).await;
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
            assert_eq!(json(response).await["error"], "missing required param: repo");
        }
        assert!(queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_repo_rejected() {
        let queue = Arc::new(MemoryQueue::new("builds"));

        let response = get(&queue, "/build?repo=justaname").await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = get(&queue, "/build?repo=acme/api&commit=not-hex").await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = get(&queue, "/build?repo=acme/api&image=Edge%20App").await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(
            json(response).await["error"]
                .as_str()
                .unwrap()
                .contains("must be lowercase without whitespace")
        );

        assert!(queue.jobs().is_empty());
    }
}
