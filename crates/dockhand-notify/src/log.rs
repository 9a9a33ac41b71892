use async_trait::async_trait;
use dockhand_core::{Notifier, NotifyError};
use tracing::{info, warn};

/// Writes notifications to the operational log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, text: &str, ok: bool) -> Result<(), NotifyError> {
        if ok {
            info!(target: "dockhand::notify", "{}", text);
        } else {
            warn!(target: "dockhand::notify", "{}", text);
        }
        Ok(())
    }
}
