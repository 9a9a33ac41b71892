//! On-disk workspaces and the name sanitization shared by paths and image tags.

use crate::job::Job;
use std::path::{Path, PathBuf};

/// Longest tag the container registry accepts.
pub const MAX_TAG_LEN: usize = 128;

/// Make a name safe for both a directory component and an image tag.
///
/// Characters outside `[A-Za-z0-9_.-]` become `-`, leading `.` and `-` are dropped, the
/// result is capped at [`MAX_TAG_LEN`] characters and an empty result becomes `_`.
/// Applying it twice gives the same answer as applying it once.
pub fn sanitize(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    let trimmed: String = mapped
        .trim_start_matches(['.', '-'])
        .chars()
        .take(MAX_TAG_LEN)
        .collect();

    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed
    }
}

/// Clone URL for `org/name` under a base such as `git@github.com:` or `https://github.com/`.
pub fn clone_url(clone_base: &str, org: &str, name: &str) -> String {
    if clone_base.ends_with(':') || clone_base.ends_with('/') {
        format!("{clone_base}{org}/{name}.git")
    } else {
        format!("{clone_base}/{org}/{name}.git")
    }
}

/// The resolved, on-disk materialization of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub clone_url: String,
    pub path: PathBuf,
    /// Branch to sync.
    pub branch: String,
    /// Sanitized branch, used as the second image tag.
    pub branch_tag: String,
    /// Set once the fetcher has synchronized the directory.
    pub sha: Option<String>,
}

impl Workspace {
    /// Derive the workspace for a job: `<home>/<org>/<name>/<branch>`, every component
    /// sanitized.
    pub fn for_job(job: &Job, home: &Path, clone_base: &str) -> Self {
        Self {
            clone_url: clone_url(clone_base, &job.org, &job.name),
            path: Self::path_for(home, &job.org, &job.name, &job.branch),
            branch: job.branch.clone(),
            branch_tag: sanitize(&job.branch),
            sha: None,
        }
    }

    pub fn path_for(home: &Path, org: &str, name: &str, branch: &str) -> PathBuf {
        home.join(sanitize(org))
            .join(sanitize(name))
            .join(sanitize(branch))
    }

    /// Short form of the resolved commit, for messages.
    pub fn short_sha(&self) -> Option<&str> {
        self.sha.as_deref().map(|sha| &sha[..sha.len().min(7)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_slashes() {
        assert_eq!(sanitize("feature/login"), "feature-login");
        assert_eq!(sanitize("release/1.2/hotfix"), "release-1.2-hotfix");
    }

    #[test]
    fn test_sanitize_keeps_safe_names() {
        assert_eq!(sanitize("main"), "main");
        assert_eq!(sanitize("v1.2.3_rc-1"), "v1.2.3_rc-1");
    }

    #[test]
    fn test_sanitize_strips_leading_dots_and_dashes() {
        assert_eq!(sanitize("../etc"), "etc");
        assert_eq!(sanitize("-x"), "x");
        assert_eq!(sanitize("/abs"), "abs");
    }

    #[test]
    fn test_sanitize_empty_results() {
        assert_eq!(sanitize(""), "_");
        assert_eq!(sanitize("..."), "_");
        assert_eq!(sanitize("///"), "_");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "a".repeat(300);
        assert_eq!(sanitize(&long).len(), MAX_TAG_LEN);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for raw in [
            "main",
            "feature/login",
            "../../x",
            "-/-/.",
            "héllo wörld",
            "refs/heads/x:y@z",
            "",
            "..a",
        ] {
            let once = sanitize(raw);
            assert_eq!(sanitize(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn test_clone_url_bases() {
        assert_eq!(
            clone_url("git@github.com:", "acme", "api"),
            "git@github.com:acme/api.git"
        );
        assert_eq!(
            clone_url("https://github.com/", "acme", "api"),
            "https://github.com/acme/api.git"
        );
        assert_eq!(
            clone_url("https://git.example.com", "acme", "api"),
            "https://git.example.com/acme/api.git"
        );
    }

    #[test]
    fn test_workspace_for_job() {
        let job = Job::new("acme", "api", "feature/login");
        let ws = Workspace::for_job(&job, Path::new("/var/dockhand"), "git@github.com:");

        assert_eq!(ws.path, PathBuf::from("/var/dockhand/acme/api/feature-login"));
        assert_eq!(ws.branch, "feature/login");
        assert_eq!(ws.branch_tag, "feature-login");
        assert_eq!(ws.clone_url, "git@github.com:acme/api.git");
        assert!(ws.sha.is_none());
    }

    #[test]
    fn test_path_and_tag_use_same_sanitization() {
        let job = Job::new("acme", "api", "bug/#42 fix");
        let ws = Workspace::for_job(&job, Path::new("/h"), "git@github.com:");
        let dir = ws.path.file_name().unwrap().to_str().unwrap();
        assert_eq!(dir, ws.branch_tag);
    }

    #[test]
    fn test_short_sha() {
        let mut ws = Workspace::for_job(&Job::new("a", "b", "c"), Path::new("/h"), "x:");
        assert_eq!(ws.short_sha(), None);
        ws.sha = Some("0123456789abcdef".to_string());
        assert_eq!(ws.short_sha(), Some("0123456"));
    }
}
