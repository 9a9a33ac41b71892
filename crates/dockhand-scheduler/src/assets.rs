//! Per-repository asset injection.
//!
//! Files kept outside the repository (credentials, generated config) live under
//! `<assets>/<org>/<name>` and are copied over the workspace before building.

use dockhand_config::ConfigError;
use std::path::Path;
use tracing::{debug, info};

/// Copy the tree at `source` into `workspace`, overwriting files that exist in both.
///
/// A missing `source` is not an error. Returns the number of files copied.
pub async fn copy_assets(source: &Path, workspace: &Path) -> Result<usize, ConfigError> {
    if !tokio::fs::try_exists(source).await.unwrap_or(false) {
        debug!(path = %source.display(), "No assets for repository");
        return Ok(0);
    }

    let copied = copy_tree(source, workspace)
        .await
        .map_err(|e| ConfigError::Assets {
            path: source.to_path_buf(),
            source: e,
        })?;
    info!(path = %source.display(), files = copied, "Copied assets into workspace");
    Ok(copied)
}

#[async_recursion::async_recursion]
async fn copy_tree(from: &Path, to: &Path) -> std::io::Result<usize> {
    tokio::fs::create_dir_all(to).await?;

    let mut copied = 0;
    let mut entries = tokio::fs::read_dir(from).await?;
    while let Some(entry) = entries.next_entry().await? {
        let target = to.join(entry.file_name());
        if entry.file_type().await?.is_dir() {
            copied += copy_tree(&entry.path(), &target).await?;
        } else {
            tokio::fs::copy(entry.path(), &target).await?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_source_is_noop() {
        let ws = tempfile::tempdir().unwrap();
        let copied = copy_assets(&ws.path().join("none"), ws.path()).await.unwrap();
        assert_eq!(copied, 0);
    }

    #[tokio::test]
    async fn test_copies_nested_tree_and_overwrites() {
        let assets = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(assets.path().join("config")).unwrap();
        std::fs::write(assets.path().join("config/secrets.env"), "TOKEN=x").unwrap();
        std::fs::write(assets.path().join("Dockerfile"), "FROM alpine").unwrap();
        std::fs::write(ws.path().join("Dockerfile"), "FROM scratch").unwrap();

        let copied = copy_assets(assets.path(), ws.path()).await.unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            std::fs::read_to_string(ws.path().join("config/secrets.env")).unwrap(),
            "TOKEN=x"
        );
        assert_eq!(
            std::fs::read_to_string(ws.path().join("Dockerfile")).unwrap(),
            "FROM alpine"
        );
    }

    #[tokio::test]
    async fn test_unreadable_source_is_config_error() {
        let assets = tempfile::tempdir().unwrap();
        let file = assets.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();
        let ws = tempfile::tempdir().unwrap();

        let err = copy_assets(&file, ws.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Assets { .. }));
    }
}
