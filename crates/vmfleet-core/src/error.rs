use std::path::PathBuf;
use thiserror::Error;

/// Malformed or inconsistent declared configuration.
///
/// Raised synchronously while loading, merging or resolving declarations,
/// always before any provider call is made.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("invalid JSON declaration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML declaration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("`{key}` must be {expected}")]
    Malformed { key: String, expected: &'static str },

    #[error("missing required key `{key}` in group '{group}'")]
    MissingKey { group: String, key: &'static str },

    #[error("group has neither `group_name` nor any `inventory_groups` to derive it from")]
    MissingGroupName,

    #[error("unknown cloud: {0}")]
    UnknownCloud(String),

    #[error("group {0} is declared more than once")]
    DuplicateGroup(String),

    #[error("cluster '{0}': copies must be a positive integer")]
    InvalidCopies(String),

    #[error("group '{0}': instance cpu cannot be null")]
    MissingCpu(String),

    #[error("no instance type in defaults for cloud={cloud} cpu={cpu} mem={mem}")]
    UnknownInstanceType {
        cloud: String,
        cpu: u32,
        mem: String,
    },
}

impl ConfigError {
    pub(crate) fn malformed(key: impl Into<String>, expected: &'static str) -> Self {
        Self::Malformed {
            key: key.into(),
            expected,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
