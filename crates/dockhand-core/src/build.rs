//! Build specifications and their outcomes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// One image to build from a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Directory relative to the workspace root.
    pub dir: PathBuf,
    /// Image repository, without a tag.
    pub image: String,
    /// Dockerfile path relative to `dir`.
    pub dockerfile: String,
}

impl BuildSpec {
    pub fn new(dir: impl Into<PathBuf>, image: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            image: image.into(),
            dockerfile: DEFAULT_DOCKERFILE.to_string(),
        }
    }

    pub fn with_dockerfile(mut self, dockerfile: impl Into<String>) -> Self {
        self.dockerfile = dockerfile.into();
        self
    }

    /// Absolute build context inside `workspace`.
    pub fn context_in(&self, workspace: &Path) -> PathBuf {
        if self.dir.as_os_str().is_empty() || self.dir == Path::new(".") {
            workspace.to_path_buf()
        } else {
            workspace.join(&self.dir)
        }
    }
}

/// Outcome of one build specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub spec: BuildSpec,
    /// Fully qualified image repository the tags were applied to.
    pub image: String,
    pub success: bool,
    /// Tags pushed, as `image:tag`.
    pub tags: Vec<String>,
    pub error: Option<String>,
}

impl BuildResult {
    pub fn succeeded(spec: BuildSpec, image: String, tags: Vec<String>) -> Self {
        Self {
            spec,
            image,
            success: true,
            tags,
            error: None,
        }
    }

    pub fn failed(spec: BuildSpec, image: String, error: impl ToString) -> Self {
        Self {
            spec,
            image,
            success: false,
            tags: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// Check that `image` can name a repository for the container engine.
///
/// The engine refuses uppercase repository names, and whitespace would split the
/// argument. The error is the reason, for the caller to attach to its own field.
pub fn check_image_name(image: &str) -> Result<(), String> {
    if image.trim().is_empty() {
        return Err("must not be empty".to_string());
    }
    if image.chars().any(|c| c.is_whitespace() || c.is_ascii_uppercase()) {
        return Err(format!("{image:?} must be lowercase without whitespace"));
    }
    Ok(())
}

/// Drop a `:tag` or `@digest` suffix; the pipeline applies its own tags.
pub fn strip_tag(image: &str) -> &str {
    let image = image.split('@').next().unwrap_or(image);
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[name_start..].find(':') {
        Some(colon) => &image[..name_start + colon],
        None => image,
    }
}

/// Prefix `image` with `registry` unless it already carries it.
pub fn qualify_image(registry: Option<&str>, image: &str) -> String {
    let image = strip_tag(image);
    match registry.map(|r| r.trim_end_matches('/')) {
        Some(registry) if !registry.is_empty() && !image.starts_with(&format!("{registry}/")) => {
            format!("{registry}/{image}")
        }
        _ => image.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dockerfile() {
        assert_eq!(BuildSpec::new(".", "api").dockerfile, "Dockerfile");
    }

    #[test]
    fn test_context_in_root_and_subdir() {
        let ws = Path::new("/ws");
        assert_eq!(BuildSpec::new(".", "api").context_in(ws), PathBuf::from("/ws"));
        assert_eq!(BuildSpec::new("", "api").context_in(ws), PathBuf::from("/ws"));
        assert_eq!(
            BuildSpec::new("services/web", "web").context_in(ws),
            PathBuf::from("/ws/services/web")
        );
    }

    #[test]
    fn test_strip_tag() {
        assert_eq!(strip_tag("api"), "api");
        assert_eq!(strip_tag("api:latest"), "api");
        assert_eq!(strip_tag("localhost:5000/api"), "localhost:5000/api");
        assert_eq!(strip_tag("localhost:5000/api:dev"), "localhost:5000/api");
        assert_eq!(strip_tag("api@sha256:abcd"), "api");
    }

    #[test]
    fn test_check_image_name() {
        assert!(check_image_name("registry.example.com/acme/api-server").is_ok());
        assert!(check_image_name("  ").is_err());
        assert_eq!(
            check_image_name("Edge App").unwrap_err(),
            "\"Edge App\" must be lowercase without whitespace"
        );
        assert!(check_image_name("acme/API").is_err());
    }

    #[test]
    fn test_qualify_image() {
        assert_eq!(qualify_image(None, "api"), "api");
        assert_eq!(qualify_image(Some(""), "api"), "api");
        assert_eq!(
            qualify_image(Some("registry.example.com"), "api"),
            "registry.example.com/api"
        );
        assert_eq!(
            qualify_image(Some("registry.example.com/"), "acme/api:old"),
            "registry.example.com/acme/api"
        );
        assert_eq!(
            qualify_image(Some("registry.example.com"), "registry.example.com/api"),
            "registry.example.com/api"
        );
    }

    #[test]
    fn test_result_constructors() {
        let spec = BuildSpec::new(".", "api");
        let ok = BuildResult::succeeded(spec.clone(), "api".into(), vec!["api:abc".into()]);
        assert!(ok.success);
        assert!(ok.error.is_none());

        let failed = BuildResult::failed(spec, "api".into(), "boom");
        assert!(!failed.success);
        assert!(failed.tags.is_empty());
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
