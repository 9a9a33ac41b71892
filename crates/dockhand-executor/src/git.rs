//! Workspace synchronization with git.

use dockhand_core::job::is_object_id;
use dockhand_core::{CommandOutput, CommandRunner, CommandSpec, FetchError, Workspace};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Brings a workspace directory to the tip of a branch.
///
/// The directory is a disposable build cache: local changes and untracked files are
/// thrown away on every sync.
pub struct GitFetcher {
    runner: Arc<dyn CommandRunner>,
    git: String,
}

impl GitFetcher {
    pub fn new(runner: Arc<dyn CommandRunner>, git: impl Into<String>) -> Self {
        Self {
            runner,
            git: git.into(),
        }
    }

    /// Synchronize `workspace` to its branch, then to `commit` if given, and return the
    /// resolved commit id.
    pub async fn sync(
        &self,
        workspace: &Workspace,
        commit: Option<&str>,
    ) -> Result<String, FetchError> {
        let dir = &workspace.path;
        info!(
            repo = %workspace.clone_url,
            branch = %workspace.branch,
            path = %dir.display(),
            "Syncing workspace"
        );

        if self.is_working_tree(dir).await {
            info!(path = %dir.display(), "Repository exists, updating");
            self.update(workspace).await?;
        } else {
            info!(path = %dir.display(), "New repository, cloning");
            self.clone(workspace).await?;
        }

        if let Some(commit) = commit {
            info!(commit = %commit, "Checking out requested commit");
            self.git(dir, ["checkout", "--force", commit, "--"]).await?;
        }

        let head = self.git(dir, ["rev-parse", "HEAD"]).await?.stdout();
        let sha = head.trim();
        if !is_object_id(sha) {
            return Err(FetchError::UnresolvedRevision(sha.to_string()));
        }

        info!(sha = %sha, "Workspace synced");
        Ok(sha.to_string())
    }

    async fn is_working_tree(&self, dir: &Path) -> bool {
        if !dir.join(".git").exists() {
            return false;
        }
        let spec = CommandSpec::new(&self.git)
            .args(["rev-parse", "--is-inside-work-tree"])
            .current_dir(dir);
        match self.runner.run(spec).await {
            Ok(out) => out.is_success() && out.stdout().trim() == "true",
            Err(e) => {
                debug!(error = %e, "Could not inspect workspace");
                false
            }
        }
    }

    async fn clone(&self, workspace: &Workspace) -> Result<(), FetchError> {
        let dir = &workspace.path;
        let workspace_error = |source| FetchError::Workspace {
            path: dir.clone(),
            source,
        };

        // A leftover directory that is not a working tree would make the clone fail.
        if dir.exists() {
            debug!(path = %dir.display(), "Removing stale workspace directory");
            tokio::fs::remove_dir_all(dir)
                .await
                .map_err(workspace_error)?;
        }
        let parent = dir.parent().unwrap_or(dir);
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(workspace_error)?;

        let target = dir.to_string_lossy();
        self.git(
            parent,
            [
                "clone",
                "--branch",
                workspace.branch.as_str(),
                "--single-branch",
                "--",
                workspace.clone_url.as_str(),
                &*target,
            ],
        )
        .await?;
        Ok(())
    }

    /// Fetch the branch into its remote-tracking ref, then point the local branch at it.
    ///
    /// Branches that sanitize to the same directory share a single-branch clone, so the
    /// requested branch may never have been fetched here before.
    async fn update(&self, workspace: &Workspace) -> Result<(), FetchError> {
        let dir = &workspace.path;
        let branch = workspace.branch.as_str();
        let tracking = format!("refs/remotes/origin/{branch}");
        let refspec = format!("+refs/heads/{branch}:{tracking}");

        self.git(dir, ["fetch", "origin", refspec.as_str()]).await?;
        self.git(dir, ["checkout", "--force", "-B", branch, tracking.as_str()])
            .await?;
        self.git(dir, ["clean", "-fd"]).await?;
        Ok(())
    }

    async fn git<'a>(
        &self,
        cwd: &Path,
        args: impl IntoIterator<Item = &'a str>,
    ) -> Result<CommandOutput, FetchError> {
        let spec = CommandSpec::new(&self.git).args(args).current_dir(cwd);
        info!(command = %spec, "Running git");
        let output = self.runner.run(spec.clone()).await?;
        Ok(output.into_result(&spec)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_core::Job;
    use dockhand_core::testing::{FAKE_SHA, FakeToolchain};

    fn workspace(home: &Path, branch: &str) -> Workspace {
        Workspace::for_job(&Job::new("acme", "api", branch), home, "git@github.com:")
    }

    #[tokio::test]
    async fn test_first_sync_clones() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeToolchain::new());
        let fetcher = GitFetcher::new(fake.clone(), "git");
        let ws = workspace(home.path(), "feature/login");

        let sha = fetcher.sync(&ws, None).await.unwrap();

        assert_eq!(sha, FAKE_SHA);
        assert!(ws.path.join("Dockerfile").is_file());
        let commands = fake.commands();
        assert!(commands.iter().any(|c| c.starts_with(
            "git clone --branch feature/login --single-branch -- git@github.com:acme/api.git"
        )));
        assert!(!commands.iter().any(|c| c.starts_with("git fetch")));
    }

    #[tokio::test]
    async fn test_second_sync_updates_and_is_idempotent() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeToolchain::new());
        let fetcher = GitFetcher::new(fake.clone(), "git");
        let ws = workspace(home.path(), "main");

        let first = fetcher.sync(&ws, None).await.unwrap();
        let second = fetcher.sync(&ws, None).await.unwrap();

        assert_eq!(first, second);
        let commands = fake.commands();
        assert_eq!(commands.iter().filter(|c| c.starts_with("git clone")).count(), 1);
        let pos = commands
            .iter()
            .position(|c| c == "git rev-parse --is-inside-work-tree")
            .unwrap();
        assert_eq!(
            commands[pos + 1..pos + 4].to_vec(),
            vec![
                "git fetch origin +refs/heads/main:refs/remotes/origin/main",
                "git checkout --force -B main refs/remotes/origin/main",
                "git clean -fd",
            ]
        );
    }

    #[tokio::test]
    async fn test_colliding_branches_share_workspace() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeToolchain::new());
        let fetcher = GitFetcher::new(fake.clone(), "git");
        let slashed = workspace(home.path(), "feature/x");
        let dashed = workspace(home.path(), "feature-x");
        assert_eq!(slashed.path, dashed.path);

        fetcher.sync(&slashed, None).await.unwrap();
        let sha = fetcher.sync(&dashed, None).await.unwrap();
        fetcher.sync(&slashed, None).await.unwrap();

        assert_eq!(sha, FAKE_SHA);
        assert_eq!(
            fake.commands()
                .iter()
                .filter(|c| c.starts_with("git clone"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_checkout_of_unfetched_branch_fails() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeToolchain::new());
        let fetcher = GitFetcher::new(fake.clone(), "git");
        let ws = workspace(home.path(), "feature/x");
        fetcher.sync(&ws, None).await.unwrap();

        let err = fetcher
            .git(&ws.path, ["checkout", "--force", "feature-x", "--"])
            .await
            .unwrap_err();

        match err {
            FetchError::Command(failure) => {
                assert!(failure.detail.contains("invalid reference: feature-x"))
            }
            other => panic!("Expected command failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stale_directory_is_replaced() {
        let home = tempfile::tempdir().unwrap();
        let ws = workspace(home.path(), "main");
        std::fs::create_dir_all(&ws.path).unwrap();
        std::fs::write(ws.path.join("junk"), "left over").unwrap();

        let fetcher = GitFetcher::new(Arc::new(FakeToolchain::new()), "git");
        fetcher.sync(&ws, None).await.unwrap();

        assert!(!ws.path.join("junk").exists());
        assert!(ws.path.join(".git").is_dir());
    }

    #[tokio::test]
    async fn test_commit_override() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeToolchain::new());
        let fetcher = GitFetcher::new(fake.clone(), "git");
        let ws = workspace(home.path(), "main");

        let sha = fetcher.sync(&ws, Some("abcdef1234567")).await.unwrap();

        assert_eq!(sha, "abcdef1234567");
        assert!(
            fake.commands()
                .contains(&"git checkout --force abcdef1234567 --".to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_fetch_error() {
        let home = tempfile::tempdir().unwrap();
        let fetcher = GitFetcher::new(Arc::new(FakeToolchain::new().unreachable()), "git");

        let err = fetcher
            .sync(&workspace(home.path(), "main"), None)
            .await
            .unwrap_err();

        match err {
            FetchError::Command(failure) => {
                assert_eq!(failure.exit_code, Some(128));
                assert!(failure.detail.contains("Could not resolve host"));
            }
            other => panic!("Expected command failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_head_is_unresolved() {
        let home = tempfile::tempdir().unwrap();
        let fetcher = GitFetcher::new(Arc::new(FakeToolchain::new().with_head("HEAD")), "git");

        let err = fetcher
            .sync(&workspace(home.path(), "main"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnresolvedRevision(_)));
    }
}
