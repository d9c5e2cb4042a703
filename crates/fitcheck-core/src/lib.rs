//! Fitcheck Core - Fundamental types for pod fit calculations
//!
//! This crate provides:
//! - Exact resource quantities and resource lists
//! - Error types with miette diagnostics
//! - Manifest serialization helpers

pub mod error;
pub mod resources;

// Re-export commonly used types
pub use error::{FitcheckError, Result};
pub use resources::{Quantity, QuantityFormat, ResourceList};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::{Container, Node, Pod, Taint, Toleration};

use std::path::Path;

/// Serialize a resource to JSON
pub fn to_json<T: serde::Serialize>(resource: &T) -> Result<String> {
    serde_json::to_string(resource).map_err(|e| {
        FitcheckError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Serialize a resource to pretty JSON
pub fn to_json_pretty<T: serde::Serialize>(resource: &T) -> Result<String> {
    serde_json::to_string_pretty(resource).map_err(|e| {
        FitcheckError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a resource from JSON
pub fn from_json<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| {
        FitcheckError::serialization_error(
            format!("Failed to deserialize from JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a resource from YAML
pub fn from_yaml<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_yaml::from_str(data).map_err(|e| {
        FitcheckError::serialization_error(
            format!("Failed to deserialize from YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Load a manifest from disk.
///
/// Files ending in `.json` are parsed as JSON, anything else as YAML.
pub fn read_manifest<T: for<'de> serde::Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)
        .map_err(|e| FitcheckError::io_error(path.display().to_string(), e))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        from_json(&data)
    } else {
        from_yaml(&data)
    }
}
