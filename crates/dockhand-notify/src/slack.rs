//! Slack incoming-webhook transport.
//!
//! Messages are sent as a single attachment so the colour bar shows the outcome at a
//! glance. The body is form-encoded with the JSON under `payload`, which incoming webhooks
//! accept alongside raw JSON.

use async_trait::async_trait;
use dockhand_core::{Notifier, NotifyError};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::http_client;

#[derive(Debug, Serialize)]
struct Payload<'a> {
    attachments: [Attachment<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Attachment<'a> {
    text: &'a str,
    color: &'static str,
    mrkdwn_in: [&'static str; 1],
}

pub struct SlackNotifier {
    client: reqwest::Client,
    webhook: reqwest::Url,
}

impl SlackNotifier {
    /// A notifier posting to `webhook`, abandoning each message after `timeout`.
    pub fn new(webhook: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let webhook = parse_endpoint(webhook)?;
        Ok(Self {
            client: http_client(timeout)?,
            webhook,
        })
    }
}

/// JSON body for one message.
pub fn payload(text: &str, ok: bool) -> String {
    let payload = Payload {
        attachments: [Attachment {
            text,
            color: if ok { "good" } else { "danger" },
            mrkdwn_in: ["text"],
        }],
    };
    // Serializing borrowed strings into a String cannot fail.
    serde_json::to_string(&payload).unwrap_or_default()
}

pub(crate) fn parse_endpoint(url: &str) -> Result<reqwest::Url, NotifyError> {
    let parsed =
        reqwest::Url::parse(url).map_err(|e| NotifyError::InvalidEndpoint(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(NotifyError::InvalidEndpoint(format!(
            "{url}: unsupported scheme {other}"
        ))),
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn notify(&self, text: &str, ok: bool) -> Result<(), NotifyError> {
        let body = payload(text, ok);
        debug!(ok, "Posting Slack notification");

        let response = self
            .client
            .post(self.webhook.clone())
            .form(&[("payload", body)])
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
