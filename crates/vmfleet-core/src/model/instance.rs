//! Running instances as reported by a provider

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Cloud provider owning an instance or group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cloud {
    Aws,
    Gcp,
    Azure,
}

impl Cloud {
    pub const ALL: [Cloud; 3] = [Cloud::Aws, Cloud::Gcp, Cloud::Azure];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cloud::Aws => "aws",
            Cloud::Gcp => "gcp",
            Cloud::Azure => "azure",
        }
    }

    /// Zone used when the provider has no zone concept for a group.
    pub fn default_zone(&self) -> &'static str {
        match self {
            Cloud::Azure => "default",
            Cloud::Aws | Cloud::Gcp => "",
        }
    }
}

impl fmt::Display for Cloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cloud {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" => Ok(Cloud::Aws),
            "gcp" => Ok(Cloud::Gcp),
            "azure" => Ok(Cloud::Azure),
            other => Err(ConfigError::UnknownCloud(other.to_string())),
        }
    }
}

/// Provider-agnostic lifecycle state of a VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    Terminating,
    Terminated,
}

impl InstanceState {
    /// States that count as part of the current fleet.
    pub fn is_live(&self) -> bool {
        matches!(self, InstanceState::Pending | InstanceState::Running)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::Terminating => "terminating",
            InstanceState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Snapshot of a running VM belonging to a deployment.
///
/// Records are immutable once built; many tasks read them concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Provider-native id, unique within a cloud
    pub id: String,
    pub cloud: Cloud,
    pub region: String,
    #[serde(default)]
    pub zone: String,

    #[serde(default)]
    pub public_ip: String,
    #[serde(default)]
    pub public_hostname: String,
    #[serde(default)]
    pub private_ip: String,
    #[serde(default)]
    pub private_hostname: String,

    #[serde(default)]
    pub ansible_user: String,
    #[serde(default)]
    pub inventory_groups: BTreeSet<String>,
    pub cluster_name: String,
    pub group_name: String,

    /// Opaque pass-through for downstream automation
    #[serde(default)]
    pub extra_vars: serde_json::Value,
}

impl InstanceRecord {
    pub fn matches(&self, key: &GroupKey) -> bool {
        self.cluster_name == key.cluster_name
            && self.group_name == key.group_name
            && self.region == key.region
            && self.zone == key.zone
    }

    /// True when the instance belongs to at least one of `groups`.
    pub fn in_any_group<S: AsRef<str>>(&self, groups: &[S]) -> bool {
        groups
            .iter()
            .any(|g| self.inventory_groups.contains(g.as_ref()))
    }
}

impl fmt::Display for InstanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({}/{}, {}{})",
            self.cloud, self.id, self.cluster_name, self.group_name, self.region, self.zone
        )
    }
}

/// Identity of a reconciliation group.
///
/// Many instances share one key; they are interchangeable within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub cluster_name: String,
    pub group_name: String,
    pub region: String,
    pub zone: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}{}",
            self.cluster_name, self.group_name, self.region, self.zone
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_parse() {
        assert_eq!("aws".parse::<Cloud>().unwrap(), Cloud::Aws);
        assert_eq!("GCP".parse::<Cloud>().unwrap(), Cloud::Gcp);
        assert!(matches!(
            "openstack".parse::<Cloud>(),
            Err(ConfigError::UnknownCloud(_))
        ));
    }

    #[test]
    fn test_record_deserialize_with_defaults() {
        let json = serde_json::json!({
            "id": "i-1",
            "cloud": "aws",
            "region": "us-east-1",
            "zone": "a",
            "cluster_name": "db-0",
            "group_name": "nodes",
            "inventory_groups": ["nodes", "db-0", "nodes"]
        });

        let record: InstanceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.cloud, Cloud::Aws);
        assert_eq!(record.inventory_groups.len(), 2);
        assert!(record.public_ip.is_empty());
        assert!(record.extra_vars.is_null());
        assert!(record.in_any_group(&["db-0"]));
        assert!(!record.in_any_group(&["web"]));
    }

    #[test]
    fn test_live_states() {
        assert!(InstanceState::Pending.is_live());
        assert!(InstanceState::Running.is_live());
        assert!(!InstanceState::Stopped.is_live());
        assert!(!InstanceState::Terminating.is_live());
    }
}
