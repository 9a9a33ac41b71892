//! Core domain types and ports for the Dockhand build worker.
//!
//! This crate contains:
//! - The queued `Job` and its payload validation
//! - Workspace derivation and name sanitization
//! - Build specifications and results
//! - The command-execution and notification ports
//! - Error types shared across the pipeline

pub mod build;
pub mod error;
pub mod executor;
pub mod id;
pub mod job;
pub mod notify;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod workspace;

pub use build::{BuildResult, BuildSpec};
pub use error::{BuildError, CommandFailure, Error, FetchError, NotifyError, Result};
pub use executor::{CommandOutput, CommandRunner, CommandSpec, LogLine, LogStream};
pub use id::RunId;
pub use job::{Job, PayloadError};
pub use notify::{CompletionHook, Notifier};
pub use workspace::{Workspace, sanitize};
