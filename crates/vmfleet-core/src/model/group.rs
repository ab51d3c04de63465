//! Fully resolved instance groups

use super::declaration::Declaration;
use super::defaults::{DEFAULT_MEM_TIER, Defaults, Sizing};
use super::instance::{Cloud, GroupKey};
use super::volume::Volumes;
use crate::error::{ConfigError, Result};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A homogeneous set of instances with one desired count.
///
/// Built from a merged [`Declaration`] for one copy of a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub group_name: String,
    /// Effective cluster name of the copy (`{template}-{index}`)
    pub cluster_name: String,
    pub cloud: Cloud,
    pub region: String,
    pub zone: String,
    pub exact_count: u32,

    pub volumes: Volumes,
    pub tags: BTreeMap<String, String>,
    pub inventory_groups: BTreeSet<String>,
    pub security_groups: BTreeSet<String>,

    pub sizing: Sizing,
    pub arch: String,
    pub image: String,

    pub subnet: String,
    pub public_ip: bool,
    pub vpc_id: Option<String>,

    /// SSH login user, recorded on the instance as `ansible_user`
    pub user: String,
    pub public_key_id: String,
    pub role: Option<String>,
    pub user_data: Option<String>,

    pub extra_vars: Value,
}

impl GroupSpec {
    /// Resolve a merged group declaration for the given cluster copy.
    pub fn from_declaration(cluster_name: &str, decl: &Declaration) -> Result<Self> {
        let raw: RawGroup = serde_json::from_value(Value::Object(decl.clone()))?;

        let group_name = raw.group_name.ok_or(ConfigError::MissingGroupName)?;
        let cloud: Cloud = raw
            .cloud
            .ok_or_else(|| ConfigError::MissingKey {
                group: group_name.clone(),
                key: "cloud",
            })?
            .parse()?;
        let region = raw.region.ok_or_else(|| ConfigError::MissingKey {
            group: group_name.clone(),
            key: "region",
        })?;
        let zone = raw
            .zone
            .unwrap_or_else(|| cloud.default_zone().to_string());

        let sizing = match (raw.instance_type, raw.instance.cpu) {
            (Some(instance_type), _) => Sizing::InstanceType(instance_type),
            (None, Some(cpu)) => Sizing::Shape {
                cpu,
                mem: raw
                    .instance
                    .mem
                    .unwrap_or_else(|| DEFAULT_MEM_TIER.to_string()),
            },
            (None, None) => return Err(ConfigError::MissingCpu(group_name)),
        };

        let tags = raw
            .tags
            .into_iter()
            .map(|(k, v)| (k, scalar_to_string(v)))
            .collect();

        Ok(Self {
            group_name,
            cluster_name: cluster_name.to_string(),
            cloud,
            region,
            zone,
            exact_count: raw.exact_count.unwrap_or(0),
            volumes: raw.volumes,
            tags,
            inventory_groups: raw.inventory_groups,
            security_groups: raw.security_groups,
            sizing,
            arch: raw.instance.arch.unwrap_or_else(|| "amd64".to_string()),
            image: raw.image,
            subnet: raw.subnet,
            public_ip: raw.public_ip,
            vpc_id: raw.vpc_id,
            user: raw.user,
            public_key_id: raw.public_key_id,
            role: raw.role,
            user_data: raw.user_data,
            extra_vars: raw.extra_vars,
        })
    }

    pub fn key(&self) -> GroupKey {
        GroupKey {
            cluster_name: self.cluster_name.clone(),
            group_name: self.group_name.clone(),
            region: self.region.clone(),
            zone: self.zone.clone(),
        }
    }

    pub fn instance_type(&self, defaults: &Defaults) -> Result<String> {
        self.sizing.resolve(self.cloud, defaults)
    }

    /// Inventory groups recorded on created instances: the merged groups
    /// plus the effective cluster name.
    pub fn instance_inventory_groups(&self) -> BTreeSet<String> {
        let mut groups = self.inventory_groups.clone();
        groups.insert(self.cluster_name.clone());
        groups
    }
}

impl Serialize for Sizing {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(None)?;
        match self {
            Sizing::InstanceType(t) => map.serialize_entry("instance_type", t)?,
            Sizing::Shape { cpu, mem } => {
                map.serialize_entry("cpu", cpu)?;
                map.serialize_entry("mem", mem)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Sizing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Repr {
            instance_type: Option<String>,
            #[serde(default, deserialize_with = "lenient_u32")]
            cpu: Option<u32>,
            #[serde(default, deserialize_with = "lenient_string")]
            mem: Option<String>,
        }

        let repr = Repr::deserialize(deserializer)?;
        match (repr.instance_type, repr.cpu) {
            (Some(t), _) => Ok(Sizing::InstanceType(t)),
            (None, Some(cpu)) => Ok(Sizing::Shape {
                cpu,
                mem: repr.mem.unwrap_or_else(|| DEFAULT_MEM_TIER.to_string()),
            }),
            (None, None) => Err(de::Error::custom("sizing needs instance_type or cpu")),
        }
    }
}

#[derive(Deserialize)]
struct RawGroup {
    group_name: Option<String>,
    cloud: Option<String>,
    region: Option<String>,
    zone: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    exact_count: Option<u32>,
    #[serde(default)]
    volumes: Volumes,
    #[serde(default)]
    tags: BTreeMap<String, Value>,
    #[serde(default)]
    inventory_groups: BTreeSet<String>,
    #[serde(default)]
    security_groups: BTreeSet<String>,
    instance_type: Option<String>,
    #[serde(default)]
    instance: RawShape,
    #[serde(default)]
    image: String,
    #[serde(default)]
    subnet: String,
    #[serde(default)]
    public_ip: bool,
    vpc_id: Option<String>,
    #[serde(default)]
    user: String,
    #[serde(default)]
    public_key_id: String,
    role: Option<String>,
    user_data: Option<String>,
    #[serde(default)]
    extra_vars: Value,
}

#[derive(Default, Deserialize)]
struct RawShape {
    #[serde(default, deserialize_with = "lenient_u32")]
    cpu: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    mem: Option<String>,
    arch: Option<String>,
}

/// Accepts `4`, `"4"` or null.
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u32>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("expected a non-negative integer, got {}", n))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected a non-negative integer, got '{}'", s))),
        Some(other) => Err(de::Error::custom(format!(
            "expected a non-negative integer, got {}",
            other
        ))),
    }
}

/// Accepts `"32"`, `32` or null.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Ok(Some(scalar_to_string(v))),
    }
}

fn scalar_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
