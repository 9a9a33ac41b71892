//! Notification transports for Dockhand.
//!
//! Provides:
//! - `SlackNotifier`, posting to an incoming webhook
//! - `LogNotifier`, for deployments without a chat channel
//! - `HttpCompletionHook`, the per-job completion callback

pub mod callback;
pub mod log;
pub mod slack;

pub use callback::HttpCompletionHook;
pub use log::LogNotifier;
pub use slack::SlackNotifier;

use dockhand_core::{Notifier, NotifyError};
use std::sync::Arc;
use std::time::Duration;

/// Slack when a webhook is configured, otherwise the log.
pub fn notifier_for(
    slack_webhook: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn Notifier>, NotifyError> {
    match slack_webhook {
        Some(url) => Ok(Arc::new(SlackNotifier::new(url, timeout)?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

/// HTTP client whose requests give up after `timeout`, connection included.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, NotifyError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| NotifyError::Request(format!("could not create HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_notifier_selection() {
        assert_eq!(notifier_for(None, TIMEOUT).unwrap().name(), "log");
        assert_eq!(
            notifier_for(Some("https://hooks.slack.com/services/T/B/X"), TIMEOUT)
                .unwrap()
                .name(),
            "slack"
        );
        assert!(notifier_for(Some("not a url"), TIMEOUT).is_err());
    }
}
