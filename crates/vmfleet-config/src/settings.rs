//! Settings schema

use crate::error::{Result, SettingsError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use vmfleet_core::Cloud;

/// Contents of `vmfleet.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub clouds: Clouds,
    pub scopes: Scopes,
    /// Maximum provider calls in flight; unset or 0 is unbounded
    pub max_concurrency: Option<usize>,
    pub wait: WaitSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Clouds {
    pub aws: CloudSettings,
    pub gcp: CloudSettings,
    pub azure: CloudSettings,
}

/// Helper program for one cloud
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSettings {
    pub enabled: bool,
    /// Executable name or path; `vmfleet-<cloud>` when unset
    pub program: Option<String>,
    /// Arguments placed before the subcommand
    pub args: Vec<String>,
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            program: None,
            args: Vec::new(),
        }
    }
}

/// Where each cloud is queried
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scopes {
    /// Empty asks the helper for every enabled region
    pub aws_regions: Vec<String>,
    pub gcp_project: Option<String>,
    pub azure_resource_group: Option<String>,
    pub azure_subscription_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            poll_interval_secs: 5,
        }
    }
}

impl WaitSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Settings {
    pub fn from_yaml_str(content: &str, path: &Path) -> Result<Self> {
        let settings: Settings =
            serde_yaml::from_str(content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        // an empty file is the same as no file
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }
        Self::from_yaml_str(&content, path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.wait.timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                key: "wait.timeout_secs",
                message: "must be greater than 0".to_string(),
            });
        }
        for (cloud, settings) in self.clouds.iter() {
            if settings.program.as_deref().is_some_and(|p| p.trim().is_empty()) {
                return Err(SettingsError::Invalid {
                    key: "clouds.<cloud>.program",
                    message: format!("empty program for {}", cloud),
                });
            }
        }
        Ok(())
    }

    /// Override scopes from `GCP_PROJECT`, `AZURE_RESOURCE_GROUP` and
    /// `AZURE_SUBSCRIPTION_ID`.
    pub fn apply_env(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        if let Some(project) = var("GCP_PROJECT") {
            self.scopes.gcp_project = Some(project);
        }
        if let Some(group) = var("AZURE_RESOURCE_GROUP") {
            self.scopes.azure_resource_group = Some(group);
        }
        if let Some(subscription) = var("AZURE_SUBSCRIPTION_ID") {
            self.scopes.azure_subscription_id = Some(subscription);
        }
    }

    pub fn cloud(&self, cloud: Cloud) -> &CloudSettings {
        self.clouds.get(cloud)
    }

    pub fn program(&self, cloud: Cloud) -> String {
        self.cloud(cloud)
            .program
            .clone()
            .unwrap_or_else(|| format!("vmfleet-{}", cloud))
    }

    /// Whether the cloud is enabled and has the scope it needs: GCP needs a
    /// project and Azure a resource group.
    pub fn is_queried(&self, cloud: Cloud) -> bool {
        if !self.cloud(cloud).enabled {
            return false;
        }
        match cloud {
            Cloud::Aws => true,
            Cloud::Gcp => self.scopes.gcp_project.is_some(),
            Cloud::Azure => self.scopes.azure_resource_group.is_some(),
        }
    }

    /// Clouds that will be listed and acted on
    pub fn queried_clouds(&self) -> Vec<Cloud> {
        Cloud::ALL
            .iter()
            .copied()
            .filter(|cloud| self.is_queried(*cloud))
            .collect()
    }
}

impl Clouds {
    pub fn get(&self, cloud: Cloud) -> &CloudSettings {
        match cloud {
            Cloud::Aws => &self.aws,
            Cloud::Gcp => &self.gcp,
            Cloud::Azure => &self.azure,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Cloud, &CloudSettings)> {
        Cloud::ALL.iter().map(move |cloud| (*cloud, self.get(*cloud)))
    }
}
