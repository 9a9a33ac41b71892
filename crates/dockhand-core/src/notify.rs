//! Status-reporting ports.
//!
//! Both are best-effort: the pipeline logs and discards every error they return.

use async_trait::async_trait;

use crate::error::NotifyError;

/// Receives one message per build outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Name of this notifier.
    fn name(&self) -> &'static str;

    /// Report `text`; `ok` selects success or failure styling.
    async fn notify(&self, text: &str, ok: bool) -> Result<(), NotifyError>;
}

/// Called once per job after every build has been attempted.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    async fn completed(&self, url: &str) -> Result<(), NotifyError>;
}
