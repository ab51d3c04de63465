//! Raw cluster and group declarations
//!
//! Declarations stay untyped until every inheritance level has been merged,
//! because `import` blocks and overrides may supply any key at any level.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A declaration block: a mapping from keys to arbitrary values
pub type Declaration = Map<String, Value>;

/// A cluster template, instantiated `copies` times.
///
/// ```yaml
/// - cluster_name: db
///   copies: 2
///   region: us-east-1
///   inventory_groups: [db]
///   groups:
///     - group_name: nodes
///       exact_count: 3
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Name template; each copy becomes `{cluster_name}-{index}`
    #[serde(default)]
    pub cluster_name: Option<String>,

    #[serde(default = "default_copies")]
    pub copies: u32,

    #[serde(default)]
    pub groups: Vec<Declaration>,

    /// Every other key, inherited by each group
    #[serde(flatten)]
    pub shared: Declaration,
}

fn default_copies() -> u32 {
    1
}

impl ClusterSpec {
    /// Template name, falling back to the deployment id.
    pub fn name_or<'a>(&'a self, deployment_id: &'a str) -> &'a str {
        self.cluster_name.as_deref().unwrap_or(deployment_id)
    }

    /// Effective cluster names, one per copy.
    pub fn copy_names(&self, deployment_id: &str) -> Vec<String> {
        let base = self.name_or(deployment_id);
        (0..self.copies).map(|i| format!("{}-{}", base, i)).collect()
    }

    pub fn validate(&self, deployment_id: &str) -> Result<()> {
        if self.copies == 0 {
            return Err(ConfigError::InvalidCopies(
                self.name_or(deployment_id).to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a deployment (a list of clusters) from an already decoded value.
pub fn clusters_from_value(value: Value) -> Result<Vec<ClusterSpec>> {
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        // a single cluster is accepted as a one-element deployment
        Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        _ => Err(ConfigError::malformed(
            "deployment",
            "a list of cluster mappings",
        )),
    }
}
