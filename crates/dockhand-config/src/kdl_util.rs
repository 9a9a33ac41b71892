//! Helpers for extracting values from KDL nodes.

use crate::{ConfigError, ConfigResult};
use kdl::KdlNode;

pub(crate) fn first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

pub(crate) fn all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

/// A string property; present with another type is an error.
pub(crate) fn string_prop(node: &KdlNode, name: &str, field: &str) -> ConfigResult<Option<String>> {
    match node.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_string()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| ConfigError::invalid(field, format!("expected a string, got {value}"))),
    }
}

/// The first argument of a setting node such as `workers 4`, as a string or integer.
pub(crate) fn scalar_arg(node: &KdlNode) -> Option<String> {
    let entry = node.entries().iter().find(|e| e.name().is_none())?;
    let value = entry.value();
    value
        .as_string()
        .map(|s| s.to_string())
        .or_else(|| value.as_integer().map(|i| i.to_string()))
}
