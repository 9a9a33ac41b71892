//! Queue a job from the command line.

use super::JobArgs;
use anyhow::Result;
use dockhand_config::SystemConfig;
use dockhand_scheduler::BuildQueue;

pub async fn run(config: &SystemConfig, args: JobArgs) -> Result<()> {
    let job = args.into_job(&config.default_branch)?;
    let queue = super::connect_queue(config).await?;
    let queued = queue.enqueue(&job).await?;
    println!("Queued {} as {} on {}", job, queued.id, queue.name());
    Ok(())
}
