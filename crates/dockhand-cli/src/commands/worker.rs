//! Long-running queue consumer.

use anyhow::Result;
use dockhand_config::SystemConfig;
use dockhand_scheduler::WorkerPool;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub async fn run(config: SystemConfig, workers: Option<usize>) -> Result<()> {
    let config = Arc::new(config);
    let queue = Arc::new(super::connect_queue(&config).await?);
    let orchestrator = Arc::new(super::orchestrator(config.clone())?);

    let size = workers.unwrap_or(config.workers);
    let pool = WorkerPool::new(queue, orchestrator, size, config.poll_interval());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Could not listen for interrupt");
            return;
        }
        info!("Interrupt received, finishing current jobs");
        let _ = shutdown_tx.send(true);
    });

    pool.run(shutdown_rx).await?;
    info!("All workers stopped");
    Ok(())
}
