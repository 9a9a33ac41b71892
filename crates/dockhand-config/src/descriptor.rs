//! Per-repository build descriptor.
//!
//! A repository may carry `.dockhand.kdl` at its root listing the images to build:
//!
//! ```kdl
//! builds {
//!     build image="acme/api" dir="services/api"
//!     build image="acme/worker" dir="services/worker" dockerfile="Dockerfile.worker"
//! }
//! ```
//!
//! Without the file, or without a `builds` node, the repository root is built once.

use crate::kdl_util::{first_string_arg, string_prop};
use crate::{ConfigError, ConfigResult};
use dockhand_core::BuildSpec;
use dockhand_core::build::{DEFAULT_DOCKERFILE, check_image_name};
use kdl::{KdlDocument, KdlNode};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub const DEFAULT_DESCRIPTOR: &str = ".dockhand.kdl";

/// Parse descriptor text. `None` means the document has no `builds` node.
pub fn parse_descriptor(kdl: &str) -> ConfigResult<Option<Vec<BuildSpec>>> {
    let doc: KdlDocument = kdl.parse()?;

    let mut builds: Option<Vec<BuildSpec>> = None;

    for node in doc.nodes() {
        match node.name().value() {
            "builds" => {
                if builds.is_some() {
                    return Err(ConfigError::Duplicate("builds".to_string()));
                }
                builds = Some(parse_builds(node)?);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(builds)
}

/// Resolve the build list for a synchronized workspace.
///
/// Falls back to a single build of the workspace root as `default_image` when the
/// descriptor is missing or has no `builds` node.
pub fn load_build_specs(
    workspace: &Path,
    descriptor: &str,
    default_image: &str,
) -> ConfigResult<Vec<BuildSpec>> {
    let path = workspace.join(descriptor);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No build descriptor, using default build");
            return Ok(vec![BuildSpec::new(".", default_image)]);
        }
        Err(e) => return Err(e.into()),
    };

    match parse_descriptor(&content)? {
        Some(builds) => Ok(builds),
        None => {
            debug!(path = %path.display(), "Descriptor has no builds, using default build");
            Ok(vec![BuildSpec::new(".", default_image)])
        }
    }
}

fn parse_builds(node: &KdlNode) -> ConfigResult<Vec<BuildSpec>> {
    let mut builds = Vec::new();
    let mut images = HashSet::new();

    if let Some(children) = node.children() {
        for (index, child) in children.nodes().iter().enumerate() {
            if child.name().value() != "build" {
                return Err(ConfigError::invalid(
                    "builds",
                    format!("unexpected node `{}`", child.name().value()),
                ));
            }
            let spec = parse_build(child, index)?;
            if !images.insert(spec.image.clone()) {
                return Err(ConfigError::Duplicate(format!("image {}", spec.image)));
            }
            builds.push(spec);
        }
    }

    if builds.is_empty() {
        return Err(ConfigError::invalid("builds", "list is empty"));
    }

    Ok(builds)
}

fn parse_build(node: &KdlNode, index: usize) -> ConfigResult<BuildSpec> {
    let field = |name: &str| format!("builds[{index}].{name}");

    let image = match string_prop(node, "image", &field("image"))? {
        Some(image) => Some(image),
        None => first_string_arg(node),
    }
    .ok_or_else(|| ConfigError::MissingField(field("image")))?;

    if image.trim().is_empty() {
        return Err(ConfigError::MissingField(field("image")));
    }
    check_image_name(&image).map_err(|reason| ConfigError::invalid(field("image"), reason))?;

    let dir = string_prop(node, "dir", &field("dir"))?.unwrap_or_else(|| ".".to_string());
    let dir = relative_dir(&dir).ok_or_else(|| {
        ConfigError::invalid(
            field("dir"),
            format!("{dir:?} must be a relative path inside the repository"),
        )
    })?;

    let dockerfile = string_prop(node, "dockerfile", &field("dockerfile"))?
        .unwrap_or_else(|| DEFAULT_DOCKERFILE.to_string());
    if dockerfile.trim().is_empty() || Path::new(&dockerfile).is_absolute() {
        return Err(ConfigError::invalid(
            field("dockerfile"),
            format!("{dockerfile:?} must be a relative file name"),
        ));
    }

    Ok(BuildSpec::new(dir, image).with_dockerfile(dockerfile))
}

/// Normalize `dir`, refusing absolute paths and `..` components.
fn relative_dir(dir: &str) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in Path::new(dir).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if normalized.as_os_str().is_empty() {
        Some(PathBuf::from("."))
    } else {
        Some(normalized)
    }
}
