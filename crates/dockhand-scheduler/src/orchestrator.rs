//! Job orchestrator: fetch, configure, build each image, notify.

use crate::assets::copy_assets;
use crate::locks::WorkspaceLocks;
use crate::state::{IllegalTransition, JobState};
use dockhand_config::{ConfigError, SystemConfig, load_build_specs};
use dockhand_core::build::qualify_image;
use dockhand_core::{
    BuildResult, BuildSpec, CommandRunner, CompletionHook, FetchError, Job, Notifier, RunId,
    Workspace,
};
use dockhand_executor::{GitFetcher, ImageBuilder, ImageTags};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{Instrument, error, info, info_span, warn};

/// Reason a job stopped before building anything.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("configuration failed: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] IllegalTransition),
}

/// What a completed job did.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub run_id: RunId,
    pub job: Job,
    pub sha: String,
    pub results: Vec<BuildResult>,
    pub state: JobState,
}

impl JobReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Runs one job through the pipeline.
///
/// Jobs sharing a workspace (same org, name and branch) are serialized; everything else
/// runs in parallel when the orchestrator is shared between workers.
pub struct JobOrchestrator {
    config: Arc<SystemConfig>,
    fetcher: GitFetcher,
    builder: ImageBuilder,
    notifier: Arc<dyn Notifier>,
    hook: Arc<dyn CompletionHook>,
    locks: WorkspaceLocks,
}

impl JobOrchestrator {
    pub fn new(
        config: Arc<SystemConfig>,
        runner: Arc<dyn CommandRunner>,
        notifier: Arc<dyn Notifier>,
        hook: Arc<dyn CompletionHook>,
    ) -> Self {
        let fetcher = GitFetcher::new(runner.clone(), config.git.clone());
        let (program, prefix) = config.docker_command();
        let builder = ImageBuilder::new(runner, program, prefix);
        Self {
            config,
            fetcher,
            builder,
            notifier,
            hook,
            locks: WorkspaceLocks::new(),
        }
    }

    /// Run `job` to completion.
    ///
    /// Failed builds are reported and recorded in the returned report; only fetch and
    /// configuration problems end the job with an error.
    pub async fn perform(&self, job: Job) -> Result<JobReport, JobError> {
        let run_id = RunId::new();
        let span = info_span!("job", run = %run_id.short(), job = %job);
        self.run(run_id, job).instrument(span).await
    }

    async fn run(&self, run_id: RunId, job: Job) -> Result<JobReport, JobError> {
        let mut state = JobState::Queued;
        info!(state = %state, "Job received");

        let mut workspace = Workspace::for_job(&job, &self.config.home, &self.config.clone_base);
        let _guard = self.locks.acquire(&workspace.path).await;

        advance(&mut state, JobState::Fetching)?;
        let sha = match self.fetcher.sync(&workspace, job.commit.as_deref()).await {
            Ok(sha) => sha,
            Err(e) => {
                advance(&mut state, JobState::Failed)?;
                error!(error = %e, "Fetch failed");
                return Err(e.into());
            }
        };
        workspace.sha = Some(sha.clone());

        advance(&mut state, JobState::ConfiguringBuilds)?;
        let specs = match self.configure(&job, &workspace).await {
            Ok(specs) => specs,
            Err(e) => {
                advance(&mut state, JobState::Failed)?;
                error!(error = %e, "Configuration failed");
                return Err(e.into());
            }
        };

        let tags = ImageTags::new(&sha, &workspace.branch_tag);
        let total = specs.len();
        let mut results = Vec::with_capacity(total);
        for (i, spec) in specs.iter().enumerate() {
            advance(&mut state, JobState::Building { index: i + 1, total })?;
            let image = qualify_image(self.config.registry.as_deref(), &spec.image);
            let result = self
                .builder
                .build(&workspace.path, spec, &image, &tags)
                .await;
            self.report(&job, &workspace, &result).await;
            results.push(result);
        }

        advance(&mut state, JobState::Notifying)?;
        if let Some(url) = &job.notify {
            match timeout(self.config.notify_timeout(), self.hook.completed(url)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(url = %url, error = %e, "Completion callback failed"),
                Err(_) => warn!(url = %url, "Completion callback timed out"),
            }
        }

        advance(&mut state, JobState::Done)?;
        let report = JobReport {
            run_id,
            job,
            sha,
            results,
            state,
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Job finished"
        );
        Ok(report)
    }

    /// Inject assets, then resolve the build list.
    async fn configure(
        &self,
        job: &Job,
        workspace: &Workspace,
    ) -> Result<Vec<BuildSpec>, ConfigError> {
        if let Some(assets) = self.config.assets_for(&job.org, &job.name) {
            copy_assets(&assets, &workspace.path).await?;
        }

        let default_image = job
            .image
            .clone()
            .unwrap_or_else(|| job.name.to_lowercase());
        let specs = load_build_specs(&workspace.path, &self.config.descriptor, &default_image)?;
        info!(builds = specs.len(), "Builds configured");
        Ok(specs)
    }

    async fn report(&self, job: &Job, workspace: &Workspace, result: &BuildResult) {
        let text = build_message(job, workspace, result);
        let sent = self.notifier.notify(&text, result.success);
        match timeout(self.config.notify_timeout(), sent).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(notifier = self.notifier.name(), error = %e, "Notification failed")
            }
            Err(_) => warn!(notifier = self.notifier.name(), "Notification timed out"),
        }
    }
}

fn advance(state: &mut JobState, next: JobState) -> Result<(), IllegalTransition> {
    *state = state.transition(next)?;
    info!(state = %state, "Job state changed");
    Ok(())
}

/// Chat message for one build outcome.
pub fn build_message(job: &Job, workspace: &Workspace, result: &BuildResult) -> String {
    let sha = workspace.short_sha().unwrap_or("unknown");
    if result.success {
        let tags: Vec<String> = result.tags.iter().map(|t| format!("`{t}`")).collect();
        format!(
            "Built {} ({}) and pushed {}",
            job,
            sha,
            tags.join(" and ")
        )
    } else {
        format!(
            "Failed to build `{}` from {} ({}): {}",
            result.image,
            job,
            sha,
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}
