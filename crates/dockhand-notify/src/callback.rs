use async_trait::async_trait;
use dockhand_core::{CompletionHook, NotifyError};
use std::time::Duration;
use tracing::info;

use crate::http_client;
use crate::slack::parse_endpoint;

/// Issues a GET to the job's notify URL once every build has been attempted.
#[derive(Debug, Clone)]
pub struct HttpCompletionHook {
    client: reqwest::Client,
}

impl HttpCompletionHook {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        Ok(Self {
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl CompletionHook for HttpCompletionHook {
    async fn completed(&self, url: &str) -> Result<(), NotifyError> {
        let url = parse_endpoint(url)?;
        info!(url = %url, "Calling completion hook");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}
