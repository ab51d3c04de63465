//! Instance sizing defaults
//!
//! ```yaml
//! instances:
//!   aws:
//!     "4":
//!       default: m6i.xlarge
//!       "32": r6i.xlarge
//! ```

use super::instance::Cloud;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Memory tier used when a declaration gives only a cpu count
pub const DEFAULT_MEM_TIER: &str = "default";

/// Lookup table `instances[cloud][cpu][mem] -> instance type`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub instances: HashMap<String, HashMap<String, HashMap<String, String>>>,
}

impl Defaults {
    pub fn instance_type(&self, cloud: Cloud, cpu: u32, mem: &str) -> Result<&str> {
        self.instances
            .get(cloud.as_str())
            .and_then(|by_cpu| by_cpu.get(&cpu.to_string()))
            .and_then(|by_mem| by_mem.get(mem))
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownInstanceType {
                cloud: cloud.to_string(),
                cpu,
                mem: mem.to_string(),
            })
    }
}

/// How a group asks for its machine size
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sizing {
    /// An explicit provider instance type
    InstanceType(String),
    /// A cpu/mem pair resolved through [`Defaults`]
    Shape { cpu: u32, mem: String },
}

impl Sizing {
    pub fn resolve(&self, cloud: Cloud, defaults: &Defaults) -> Result<String> {
        match self {
            Sizing::InstanceType(t) => Ok(t.clone()),
            Sizing::Shape { cpu, mem } => defaults.instance_type(cloud, *cpu, mem).map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> Defaults {
        serde_json::from_value(json!({
            "instances": {
                "aws": {
                    "2": {"default": "m6i.large"},
                    "4": {"default": "m6i.xlarge", "32": "r6i.xlarge"}
                },
                "gcp": {"4": {"default": "n2-standard-4"}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_lookup() {
        let d = defaults();
        assert_eq!(d.instance_type(Cloud::Aws, 4, "default").unwrap(), "m6i.xlarge");
        assert_eq!(d.instance_type(Cloud::Aws, 4, "32").unwrap(), "r6i.xlarge");
        assert_eq!(
            d.instance_type(Cloud::Gcp, 4, DEFAULT_MEM_TIER).unwrap(),
            "n2-standard-4"
        );
    }

    #[test]
    fn test_lookup_missing() {
        let d = defaults();
        let err = d.instance_type(Cloud::Azure, 4, "default").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownInstanceType { cpu: 4, .. }));
        assert!(d.instance_type(Cloud::Aws, 8, "default").is_err());
    }

    #[test]
    fn test_sizing_resolve() {
        let d = defaults();
        let explicit = Sizing::InstanceType("c7g.large".into());
        assert_eq!(explicit.resolve(Cloud::Aws, &d).unwrap(), "c7g.large");

        let shape = Sizing::Shape {
            cpu: 2,
            mem: DEFAULT_MEM_TIER.into(),
        };
        assert_eq!(shape.resolve(Cloud::Aws, &d).unwrap(), "m6i.large");
    }
}
