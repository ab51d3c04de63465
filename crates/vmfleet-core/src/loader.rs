//! Declaration loading
//!
//! Deployments and defaults come either from a file (JSON, or YAML by
//! extension) or from an inline JSON document passed on the command line.

use crate::error::{ConfigError, Result};
use crate::model::{ClusterSpec, Defaults, clusters_from_value};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Where a declaration comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source<'a> {
    Inline(&'a str),
    File(&'a Path),
}

impl<'a> Source<'a> {
    /// Inline when the argument looks like a JSON document, otherwise a path.
    pub fn detect(arg: &'a str) -> Self {
        let trimmed = arg.trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            Source::Inline(arg)
        } else {
            Source::File(Path::new(arg))
        }
    }
}

/// Load the list of clusters making up a deployment.
#[instrument(skip(source))]
pub fn load_deployment(source: &str) -> Result<Vec<ClusterSpec>> {
    let value: Value = load_value(Source::detect(source))?;
    let clusters = clusters_from_value(value)?;
    info!(clusters = clusters.len(), "Deployment loaded");
    Ok(clusters)
}

/// Load the instance sizing table.
#[instrument(skip(source))]
pub fn load_defaults(source: &str) -> Result<Defaults> {
    let defaults: Defaults = load_value(Source::detect(source))?;
    debug!(clouds = defaults.instances.len(), "Defaults loaded");
    Ok(defaults)
}

fn load_value<T: DeserializeOwned>(source: Source<'_>) -> Result<T> {
    match source {
        Source::Inline(text) => Ok(serde_json::from_str(text)?),
        Source::File(path) => {
            debug!(path = %path.display(), "Reading declaration file");
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            if is_yaml(path) {
                Ok(serde_yaml::from_str(&content)?)
            } else {
                Ok(serde_json::from_str(&content)?)
            }
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
