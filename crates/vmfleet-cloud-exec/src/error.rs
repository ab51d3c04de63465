//! Helper execution error types

use thiserror::Error;
use vmfleet_cloud::BackendError;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("helper program not found: {0}")]
    HelperNotFound(String),

    #[error("{program} {subcommand} failed ({status}): {stderr}")]
    CommandFailed {
        program: String,
        subcommand: String,
        status: String,
        stderr: String,
    },

    #[error("unexpected output from {subcommand}: {message}")]
    InvalidOutput { subcommand: String, message: String },

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExecError>;

impl From<ExecError> for BackendError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::HelperNotFound(_) | ExecError::CommandFailed { .. } => {
                BackendError::CommandFailed(e.to_string())
            }
            ExecError::InvalidOutput { .. } => BackendError::ApiError(e.to_string()),
            ExecError::JsonError(e) => BackendError::Json(e),
            ExecError::IoError(e) => BackendError::Io(e),
        }
    }
}
