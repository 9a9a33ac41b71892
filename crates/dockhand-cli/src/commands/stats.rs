//! Queue inspection.

use anyhow::Result;
use dockhand_config::SystemConfig;
use dockhand_scheduler::BuildQueue;

pub async fn run(config: &SystemConfig, failures: i64) -> Result<()> {
    let queue = super::connect_queue(config).await?;
    let stats = queue.stats().await?;

    println!("Queue: {}", queue.name());
    println!("  pending:   {}", stats.pending);
    println!("  working:   {}", stats.working);
    println!("  completed: {}", stats.completed);
    println!("  failed:    {}", stats.failed);

    let recent = queue.failures(failures.max(0)).await?;
    if !recent.is_empty() {
        println!("\nRecent failures:");
        for job in recent {
            println!(
                "  {} {} {}",
                job.id,
                job.payload,
                job.error.as_deref().unwrap_or("")
            );
        }
    }
    Ok(())
}
