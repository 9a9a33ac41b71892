//! API routes.

pub mod build;
pub mod github;
pub mod health;
pub mod queue;

use crate::AppState;
use axum::Router;

/// Build the main router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(build::router())
        .merge(github::router())
        .merge(queue::router())
        .merge(health::router())
        .with_state(state)
}
