//! Error types for provider calls and fleet operations

use thiserror::Error;
use vmfleet_core::{Cloud, ConfigError};

/// A single provider call failed
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("no backend configured for cloud: {0}")]
    ProviderNotFound(Cloud),

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// All failures collected during one public operation, in the order they
/// were recorded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} operation(s) failed:\n{}", .errors.len(), .errors.join("\n"))]
pub struct AggregateError {
    pub errors: Vec<String>,
}

impl AggregateError {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }
}

/// Failure of a public fleet operation
#[derive(Error, Debug)]
pub enum FleetError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl FleetError {
    /// Underlying messages, one per failed task.
    pub fn messages(&self) -> Vec<String> {
        match self {
            FleetError::Config(e) => vec![e.to_string()],
            FleetError::Aggregate(e) => e.errors.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;
