//! CLI command implementations.

pub mod enqueue;
pub mod local;
pub mod stats;
pub mod worker;

use anyhow::{Context, Result};
use clap::Args;
use dockhand_config::SystemConfig;
use dockhand_core::Job;
use dockhand_executor::ProcessRunner;
use dockhand_notify::{HttpCompletionHook, notifier_for};
use dockhand_scheduler::{JobOrchestrator, PgJobQueue};
use std::path::Path;
use std::sync::Arc;

/// A job named on the command line.
#[derive(Args, Debug)]
pub struct JobArgs {
    /// Repository as `org/name` or `org/name:branch`
    pub repo: String,
    /// Image repository for the default build
    #[arg(long)]
    pub image: Option<String>,
    /// Commit to build instead of the branch tip
    #[arg(long)]
    pub commit: Option<String>,
    /// URL to GET once the job finishes
    #[arg(long)]
    pub notify: Option<String>,
}

impl JobArgs {
    pub fn into_job(self, default_branch: &str) -> Result<Job> {
        let mut job = Job::parse_spec(&self.repo, default_branch)?;
        job.image = self.image;
        job.commit = self.commit;
        job.notify = self.notify;
        Ok(job.validated()?)
    }
}

/// Orchestrator wired to real subprocesses and the configured notifier.
pub fn orchestrator(config: Arc<SystemConfig>) -> Result<JobOrchestrator> {
    let timeout = config.notify_timeout();
    let notifier = notifier_for(config.slack_webhook.as_deref(), timeout)?;
    let hook = HttpCompletionHook::new(timeout)?;
    Ok(JobOrchestrator::new(
        config,
        Arc::new(ProcessRunner::new()),
        notifier,
        Arc::new(hook),
    ))
}

pub async fn connect_queue(config: &SystemConfig) -> Result<PgJobQueue> {
    PgJobQueue::connect(&config.database_url, config.queue.clone())
        .await
        .context("Failed to connect to queue database")
}

pub fn validate(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read descriptor: {}", path.display()))?;
    match dockhand_config::parse_descriptor(&content) {
        Ok(Some(builds)) => {
            println!("Descriptor is valid: {} build(s)", builds.len());
            for build in &builds {
                println!(
                    "  {} <- {}",
                    build.image,
                    build.dir.join(&build.dockerfile).display()
                );
            }
            Ok(())
        }
        Ok(None) => {
            println!("Descriptor is valid: no builds node, the default build will be used");
            Ok(())
        }
        Err(e) => {
            println!("Descriptor error: {}", e);
            std::process::exit(1);
        }
    }
}
