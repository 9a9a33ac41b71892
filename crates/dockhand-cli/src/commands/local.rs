//! Run one job in-process.

use super::JobArgs;
use anyhow::{Result, bail};
use dockhand_config::SystemConfig;
use std::sync::Arc;

pub async fn run(config: SystemConfig, args: JobArgs) -> Result<()> {
    let job = args.into_job(&config.default_branch)?;
    let orchestrator = super::orchestrator(Arc::new(config))?;

    println!("Running {}", job);
    let report = orchestrator.perform(job).await?;

    println!("\n--- Build Summary ({}) ---", report.sha);
    for result in &report.results {
        if result.success {
            println!("  ✓ {}  {}", result.image, result.tags.join(" "));
        } else {
            let reason = result.error.as_deref().unwrap_or("unknown error");
            println!("  ✗ {}  {}", result.image, reason);
        }
    }

    if report.failed() > 0 {
        bail!("{} of {} build(s) failed", report.failed(), report.results.len());
    }
    println!("\n✓ {} build(s) pushed", report.succeeded());
    Ok(())
}
