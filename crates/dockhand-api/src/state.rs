//! Application state.

use dockhand_config::SystemConfig;
use dockhand_scheduler::BuildQueue;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn BuildQueue>,
    /// Branch used when a manual trigger names none.
    pub default_branch: String,
    /// Shared secret for `X-Hub-Signature-256`; unsigned webhooks are accepted without it.
    pub webhook_secret: Option<String>,
}

impl AppState {
    pub fn new(queue: Arc<dyn BuildQueue>, config: &SystemConfig) -> Self {
        Self {
            queue,
            default_branch: config.default_branch.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }
}
