//! GitHub push webhook: `POST /github`.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use dockhand_core::Job;
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use tracing::{info, warn};

use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new().route("/github", post(github_webhook))
}

async fn github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let event_type = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    if let Some(secret) = &state.webhook_secret {
        let signature = headers
            .get("X-Hub-Signature-256")
            .and_then(|v| v.to_str().ok());
        if !verify_github_signature(secret, &body, signature) {
            warn!(event = %event_type, "Invalid webhook signature");
            return Err(ApiError::Unauthorized("invalid signature".to_string()));
        }
    }

    if event_type != "push" {
        info!(event = %event_type, "Ignoring webhook event");
        return Ok(ignored(format!("event {event_type}")));
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;

    let job = match push_job(&payload)? {
        PushOutcome::Build(job) => job,
        PushOutcome::Skip(reason) => {
            info!(reason = %reason, "Ignoring push");
            return Ok(ignored(reason));
        }
    };

    let queued = state.queue.enqueue(&job).await?;
    info!(job = %job, delivery = %queued.id, "Push queued for build");

    Ok(Json(json!({
        "status": "queued",
        "id": queued.id,
        "job": job,
    })))
}

fn ignored(reason: impl Into<String>) -> Json<Value> {
    Json(json!({ "status": "ignored", "reason": reason.into() }))
}

#[derive(Debug)]
enum PushOutcome {
    Build(Job),
    Skip(String),
}

/// Turn a push payload into a job for the pushed branch.
fn push_job(payload: &Value) -> Result<PushOutcome, ApiError> {
    let git_ref = payload
        .get("ref")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("push payload has no ref".to_string()))?;

    let Some(branch) = git_ref.strip_prefix("refs/heads/") else {
        return Ok(PushOutcome::Skip(format!("{git_ref} is not a branch")));
    };
    if payload.get("deleted").and_then(Value::as_bool) == Some(true) {
        return Ok(PushOutcome::Skip(format!("branch {branch} was deleted")));
    }

    let repository = payload
        .get("repository")
        .ok_or_else(|| ApiError::BadRequest("push payload has no repository".to_string()))?;
    let name = repository.get("name").and_then(Value::as_str);
    let org = repository
        .get("owner")
        .and_then(|o| o.get("login").or_else(|| o.get("name")))
        .and_then(Value::as_str)
        .or_else(|| repository.get("organization").and_then(Value::as_str));

    let (Some(org), Some(name)) = (org, name) else {
        return Err(ApiError::BadRequest(
            "push payload has no repository owner or name".to_string(),
        ));
    };

    Ok(PushOutcome::Build(Job::new(org, name, branch).validated()?))
}

/// Check a `sha256=<hex>` signature of `body` under `secret`.
pub fn verify_github_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(signature) = signature else {
        return false;
    };

    let Some(sig_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    mac.verify_slice(&sig_bytes).is_ok()
}
