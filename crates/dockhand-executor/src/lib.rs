//! Subprocess adapters for Dockhand.
//!
//! Provides:
//! - `ProcessRunner`, the real command-execution port
//! - `GitFetcher`, which synchronizes workspaces
//! - `ImageBuilder`, which builds, tags and pushes images

pub mod git;
pub mod image;
pub mod process;

pub use git::GitFetcher;
pub use image::{ImageBuilder, ImageTags};
pub use process::ProcessRunner;
