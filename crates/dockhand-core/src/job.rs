//! The unit of work taken off the queue.

use crate::build::check_image_name;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A queued build request.
///
/// The queue payload is a JSON object with required `org`, `name` and `branch`, and
/// optional `image`, `commit` and `notify`. Unknown keys are ignored so producers can add
/// fields without breaking older workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub org: String,
    pub name: String,
    pub branch: String,
    /// Image name for the default build, replacing the one derived from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Build this commit instead of the branch tip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// URL to call once every build has been attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<String>,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed job payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("job field `{0}` is empty")]
    Empty(&'static str),

    #[error("job field `{field}` is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl Job {
    pub fn new(
        org: impl Into<String>,
        name: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            org: org.into(),
            name: name.into(),
            branch: branch.into(),
            image: None,
            commit: None,
            notify: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn with_notify(mut self, url: impl Into<String>) -> Self {
        self.notify = Some(url.into());
        self
    }

    /// Decode and validate a queue payload.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, PayloadError> {
        let job: Job = serde_json::from_value(payload.clone())?;
        job.validated()
    }

    /// Parse the `org/name[:branch]` shorthand used by the manual trigger and the CLI.
    ///
    /// A trailing `.git` on the repository is dropped. Everything after the first `:` is
    /// the branch, so branches containing `/` survive intact.
    pub fn parse_spec(spec: &str, default_branch: &str) -> Result<Self, PayloadError> {
        let spec = spec.trim();
        let (repo, branch) = match spec.split_once(':') {
            Some((repo, branch)) => (repo, branch.trim_end_matches(".git")),
            None => (spec, default_branch),
        };
        let repo = repo.trim_end_matches(".git");
        let (org, name) = repo.split_once('/').ok_or_else(|| PayloadError::Invalid {
            field: "repo",
            reason: format!("expected org/name, got {repo:?}"),
        })?;
        let branch = if branch.is_empty() { default_branch } else { branch };

        Job::new(org, name, branch).validated()
    }

    /// Normalize optional fields and check the invariants the pipeline relies on.
    pub fn validated(mut self) -> Result<Self, PayloadError> {
        self.org = self.org.trim().to_string();
        self.name = self.name.trim().to_string();
        self.branch = self.branch.trim().to_string();
        self.image = non_empty(self.image.take());
        self.commit = non_empty(self.commit.take());
        self.notify = non_empty(self.notify.take());

        check_path_component("org", &self.org)?;
        check_path_component("name", &self.name)?;

        if self.branch.is_empty() {
            return Err(PayloadError::Empty("branch"));
        }
        if self.branch.starts_with('-')
            || self
                .branch
                .chars()
                .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(PayloadError::Invalid {
                field: "branch",
                reason: format!("{:?} is not a valid ref name", self.branch),
            });
        }

        if let Some(image) = &self.image {
            check_image_name(image).map_err(|reason| PayloadError::Invalid {
                field: "image",
                reason,
            })?;
        }

        if let Some(commit) = &self.commit {
            if !is_object_id(commit) {
                return Err(PayloadError::Invalid {
                    field: "commit",
                    reason: format!("{commit:?} is not a hexadecimal commit id"),
                });
            }
        }

        if let Some(url) = &self.notify {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(PayloadError::Invalid {
                    field: "notify",
                    reason: format!("{url:?} is not an http(s) URL"),
                });
            }
        }

        Ok(self)
    }

    /// Serialize for the queue.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.org, self.name, self.branch)
    }
}

/// Whether `s` looks like an abbreviated or full git object id.
pub fn is_object_id(s: &str) -> bool {
    (7..=64).contains(&s.len()) && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_path_component(field: &'static str, value: &str) -> Result<(), PayloadError> {
    if value.is_empty() {
        return Err(PayloadError::Empty(field));
    }
    if value == "."
        || value == ".."
        || value.starts_with('-')
        || value.contains('/')
        || value.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(PayloadError::Invalid {
            field,
            reason: format!("{value:?} is not a valid repository path component"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_with_required_fields() {
        let job = Job::from_payload(&json!({
            "org": "acme",
            "name": "api",
            "branch": "main",
        }))
        .unwrap();

        assert_eq!(job, Job::new("acme", "api", "main"));
    }

    #[test]
    fn test_payload_ignores_unknown_keys() {
        let job = Job::from_payload(&json!({
            "org": "acme",
            "name": "api",
            "branch": "main",
            "pusher": "someone",
            "retries": 3,
        }))
        .unwrap();

        assert_eq!(job, Job::new("acme", "api", "main"));
    }

    #[test]
    fn test_payload_null_and_blank_optionals_become_none() {
        let job = Job::from_payload(&json!({
            "org": "acme",
            "name": "api",
            "branch": "main",
            "image": null,
            "commit": "  ",
            "notify": "",
        }))
        .unwrap();

        assert!(job.image.is_none());
        assert!(job.commit.is_none());
        assert!(job.notify.is_none());
    }

    #[test]
    fn test_payload_missing_branch_is_malformed() {
        let err = Job::from_payload(&json!({ "org": "acme", "name": "api" })).unwrap_err();
        assert!(matches!(err, PayloadError::Malformed(_)));
        assert!(err.to_string().contains("branch"));
    }

    #[test]
    fn test_payload_empty_org_rejected() {
        let err = Job::from_payload(&json!({ "org": " ", "name": "api", "branch": "main" }))
            .unwrap_err();
        assert!(matches!(err, PayloadError::Empty("org")));
    }

    #[test]
    fn test_branch_that_looks_like_an_option_rejected() {
        let err = Job::new("acme", "api", "--upload-pack=evil").validated().unwrap_err();
        assert!(matches!(err, PayloadError::Invalid { field: "branch", .. }));
    }

    #[test]
    fn test_commit_must_be_hex() {
        assert!(Job::new("acme", "api", "main").with_commit("abc1234").validated().is_ok());
        let err = Job::new("acme", "api", "main")
            .with_commit("HEAD~1")
            .validated()
            .unwrap_err();
        assert!(matches!(err, PayloadError::Invalid { field: "commit", .. }));
    }

    #[test]
    fn test_image_override_must_be_an_engine_name() {
        let err = Job::new("acme", "api", "main")
            .with_image("Edge App")
            .validated()
            .unwrap_err();
        assert!(matches!(err, PayloadError::Invalid { field: "image", .. }));

        let err = Job::from_payload(&json!({
            "org": "acme",
            "name": "api",
            "branch": "main",
            "image": "Acme/Edge",
        }))
        .unwrap_err();
        assert!(matches!(err, PayloadError::Invalid { field: "image", .. }));
    }

    #[test]
    fn test_notify_must_be_http() {
        let err = Job::new("acme", "api", "main")
            .with_notify("ftp://example.com")
            .validated()
            .unwrap_err();
        assert!(matches!(err, PayloadError::Invalid { field: "notify", .. }));
    }

    #[test]
    fn test_parse_spec_full() {
        let job = Job::parse_spec("acme/api:develop", "master").unwrap();
        assert_eq!(job, Job::new("acme", "api", "develop"));
    }

    #[test]
    fn test_parse_spec_default_branch() {
        let job = Job::parse_spec("acme/api", "master").unwrap();
        assert_eq!(job.branch, "master");
    }

    #[test]
    fn test_parse_spec_strips_git_suffix() {
        assert_eq!(Job::parse_spec("acme/api.git", "master").unwrap().name, "api");
        let job = Job::parse_spec("acme/api.git:main", "master").unwrap();
        assert_eq!(job.name, "api");
        assert_eq!(job.branch, "main");
    }

    #[test]
    fn test_parse_spec_keeps_slashes_in_branch() {
        let job = Job::parse_spec("acme/api:feature/login", "master").unwrap();
        assert_eq!(job.branch, "feature/login");
    }

    #[test]
    fn test_parse_spec_requires_org() {
        assert!(Job::parse_spec("api:main", "master").is_err());
    }

    #[test]
    fn test_payload_round_trip_omits_absent_optionals() {
        let job = Job::new("acme", "api", "main").with_image("registry/api");
        let payload = job.to_payload();
        assert_eq!(payload, json!({
            "org": "acme",
            "name": "api",
            "branch": "main",
            "image": "registry/api",
        }));
        assert_eq!(Job::from_payload(&payload).unwrap(), job);
    }

    #[test]
    fn test_display_uses_spec_shorthand() {
        assert_eq!(Job::new("acme", "api", "feature/x").to_string(), "acme/api:feature/x");
    }
}
