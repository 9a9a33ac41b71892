//! Configuration parsing for Dockhand.
//!
//! This crate handles parsing of:
//! - Per-repository build descriptors (`.dockhand.kdl`)
//! - Process-wide system configuration

pub mod descriptor;
pub mod error;
mod kdl_util;
pub mod system;

pub use descriptor::{DEFAULT_DESCRIPTOR, load_build_specs, parse_descriptor};
pub use error::{ConfigError, ConfigResult};
pub use system::{SystemConfig, parse_system_config};
