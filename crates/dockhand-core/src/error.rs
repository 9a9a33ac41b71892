//! Error types for Dockhand.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A subprocess that ran but exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{command}` exited with {}: {detail}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
pub struct CommandFailure {
    pub command: String,
    pub exit_code: Option<i32>,
    /// Tail of the command output.
    pub detail: String,
}

/// Source synchronization failed. Fatal for the job.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("workspace {path} is not usable: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Command(#[from] CommandFailure),

    #[error("could not run git: {0}")]
    Exec(#[from] Error),

    #[error("could not resolve revision: {0:?}")]
    UnresolvedRevision(String),
}

/// One image failed to build or publish. Isolated to its build specification.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("dockerfile {0} does not exist")]
    MissingDockerfile(PathBuf),

    #[error(transparent)]
    Command(#[from] CommandFailure),

    #[error("could not run container engine: {0}")]
    Exec(#[from] Error),
}

/// Status reporting failed. Always swallowed by the pipeline.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("endpoint returned {0}")]
    Status(u16),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failure_message() {
        let failure = CommandFailure {
            command: "git fetch origin main".to_string(),
            exit_code: Some(128),
            detail: "fatal: couldn't find remote ref main".to_string(),
        };
        assert_eq!(
            failure.to_string(),
            "`git fetch origin main` exited with 128: fatal: couldn't find remote ref main"
        );
    }

    #[test]
    fn test_command_failure_killed_by_signal() {
        let failure = CommandFailure {
            command: "docker build".to_string(),
            exit_code: None,
            detail: String::new(),
        };
        assert!(failure.to_string().contains("exited with signal"));
    }

    #[test]
    fn test_fetch_error_is_transparent_over_command() {
        let failure = CommandFailure {
            command: "git clone".to_string(),
            exit_code: Some(128),
            detail: "Could not resolve host".to_string(),
        };
        let err = FetchError::from(failure.clone());
        assert_eq!(err.to_string(), failure.to_string());
    }
}
