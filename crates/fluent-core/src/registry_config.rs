// crates/fluent-core/src/registry_config.rs

//! Thin YAML loader feeding the Model Registry constructor.
//!
//! This is the one external collaborator the core needs *some* concrete
//! implementation of to be exercised end-to-end; it performs no schema
//! validation beyond what `serde` gives for free; the registry itself
//! treats its output as an opaque `Vec<ModelCapability>`.

use crate::error::{RouterError, RouterResult};
use crate::types::ModelCapability;
use std::path::Path;

/// Parses a YAML document (a top-level sequence of capability records)
/// into the list the `ModelRegistry` constructor expects.
pub fn load_registry_yaml(path: impl AsRef<Path>) -> RouterResult<Vec<ModelCapability>> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        RouterError::InvalidRequest(format!(
            "failed to read registry file {}: {e}",
            path.as_ref().display()
        ))
    })?;
    parse_registry_yaml(&contents)
}

/// Same as [`load_registry_yaml`] but operates on an in-memory string,
/// for callers that already have the document (embedded config, a test
/// fixture) without a filesystem round trip.
pub fn parse_registry_yaml(contents: &str) -> RouterResult<Vec<ModelCapability>> {
    let models: Vec<ModelCapability> = serde_yaml::from_str(contents)?;
    Ok(models)
}
