//! Image construction through the container engine CLI.

use dockhand_core::{BuildError, BuildResult, BuildSpec, CommandRunner, CommandSpec};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// The two tags every image receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTags {
    /// Resolved commit id.
    pub sha: String,
    /// Sanitized branch name.
    pub branch: String,
}

impl ImageTags {
    pub fn new(sha: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            branch: branch.into(),
        }
    }
}

/// Builds, tags and pushes images with `docker` (or anything that speaks its CLI).
pub struct ImageBuilder {
    runner: Arc<dyn CommandRunner>,
    program: String,
    prefix: Vec<String>,
}

impl ImageBuilder {
    /// `program` runs the engine; `prefix` precedes every subcommand, so
    /// `("sudo", ["docker"])` runs `sudo docker build ...`.
    pub fn new(runner: Arc<dyn CommandRunner>, program: &str, prefix: &[String]) -> Self {
        Self {
            runner,
            program: program.to_string(),
            prefix: prefix.to_vec(),
        }
    }

    /// Build `spec` from `workspace` as `image`, then tag and push it.
    ///
    /// Never fails: problems are reported in the returned [`BuildResult`].
    pub async fn build(
        &self,
        workspace: &Path,
        spec: &BuildSpec,
        image: &str,
        tags: &ImageTags,
    ) -> BuildResult {
        match self.try_build(workspace, spec, image, tags).await {
            Ok(pushed) => {
                info!(image = %image, tags = ?pushed, "Image published");
                BuildResult::succeeded(spec.clone(), image.to_string(), pushed)
            }
            Err(e) => {
                warn!(image = %image, error = %e, "Image build failed");
                BuildResult::failed(spec.clone(), image.to_string(), e)
            }
        }
    }

    async fn try_build(
        &self,
        workspace: &Path,
        spec: &BuildSpec,
        image: &str,
        tags: &ImageTags,
    ) -> Result<Vec<String>, BuildError> {
        let context = spec.context_in(workspace);
        if !context.is_dir() {
            return Err(BuildError::MissingDirectory(context));
        }
        let dockerfile = context.join(&spec.dockerfile);
        if !dockerfile.is_file() {
            return Err(BuildError::MissingDockerfile(dockerfile));
        }

        let sha_ref = format!("{image}:{}", tags.sha);
        let branch_ref = format!("{image}:{}", tags.branch);

        info!(image = %image, dir = %spec.dir.display(), "Building image");
        self.engine(
            &context,
            [
                "build",
                "--rm",
                "-f",
                spec.dockerfile.as_str(),
                "-t",
                sha_ref.as_str(),
                ".",
            ],
            true,
        )
        .await?;

        info!(from = %sha_ref, to = %branch_ref, "Tagging image");
        self.engine(&context, ["tag", sha_ref.as_str(), branch_ref.as_str()], false)
            .await?;

        for reference in [&sha_ref, &branch_ref] {
            info!(tag = %reference, "Pushing image");
            self.engine(&context, ["push", reference.as_str()], true)
                .await?;
        }

        Ok(vec![sha_ref, branch_ref])
    }

    async fn engine<'a>(
        &self,
        cwd: &Path,
        args: impl IntoIterator<Item = &'a str>,
        streamed: bool,
    ) -> Result<(), BuildError> {
        let mut spec = CommandSpec::new(&self.program)
            .args(self.prefix.iter().map(String::as_str))
            .args(args)
            .current_dir(cwd);
        if streamed {
            spec = spec.streamed();
        }
        let output = self.runner.run(spec.clone()).await?;
        output.into_result(&spec)?;
        Ok(())
    }
}
