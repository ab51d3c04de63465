//! Disk declarations

use serde::{Deserialize, Serialize};

/// Boot disk plus any number of data disks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volumes {
    #[serde(default)]
    pub os: VolumeSpec,
    #[serde(default)]
    pub data: Vec<VolumeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Size in GB; the backend picks its own default when absent
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default, rename = "type")]
    pub kind: VolumeKind,
    #[serde(default)]
    pub iops: Option<u32>,
    #[serde(default)]
    pub throughput: Option<u32>,
    #[serde(default = "default_delete_on_termination")]
    pub delete_on_termination: bool,
}

impl Default for VolumeSpec {
    fn default() -> Self {
        Self {
            size: None,
            kind: VolumeKind::default(),
            iops: None,
            throughput: None,
            delete_on_termination: true,
        }
    }
}

fn default_delete_on_termination() -> bool {
    true
}

/// Provider-neutral disk class; each backend maps it to its own type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeKind {
    #[default]
    StandardSsd,
    PremiumSsd,
    LocalSsd,
    StandardHdd,
    PremiumHdd,
    Gp2,
}
