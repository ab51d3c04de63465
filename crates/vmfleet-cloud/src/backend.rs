//! Provisioning backend trait definition

use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use vmfleet_core::{Cloud, ConfigError, Defaults, GroupSpec, InstanceRecord, InstanceState};

/// Per-cloud provisioning capability
///
/// One implementation exists per cloud; the engine picks it once from the
/// `cloud` field of a [`GroupSpec`] or [`InstanceRecord`].
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    /// The cloud this backend talks to
    fn cloud(&self) -> Cloud;

    /// Scopes that must each be listed to see the whole deployment
    /// (for example every AWS region). Defaults to a single global scope.
    async fn scopes(&self) -> BackendResult<Vec<Scope>> {
        Ok(vec![Scope::global(self.cloud())])
    }

    /// Live (pending or running) instances tagged with `deployment_id`
    async fn list(&self, deployment_id: &str, scope: &Scope) -> BackendResult<Vec<InstanceRecord>>;

    /// Launch one instance. Addresses may still be empty in the result.
    async fn create(&self, request: &CreateRequest) -> BackendResult<InstanceRecord>;

    /// Re-read an instance, including its network addresses
    async fn describe(&self, instance: &InstanceRecord) -> BackendResult<InstanceRecord>;

    /// Block until the instance reaches `target`.
    ///
    /// Providers without a waiting primitive for a state return immediately.
    async fn wait_until(&self, instance: &InstanceRecord, target: InstanceState) -> BackendResult<()> {
        let _ = (instance, target);
        Ok(())
    }

    /// Terminate an instance
    async fn delete(&self, instance: &InstanceRecord) -> BackendResult<()>;

    async fn stop(&self, instance: &InstanceRecord) -> BackendResult<()>;

    async fn start(&self, instance: &InstanceRecord) -> BackendResult<()>;

    /// Change the instance type; the instance must already be stopped
    async fn modify_size(&self, instance: &InstanceRecord, instance_type: &str) -> BackendResult<()>;
}

/// A listing scope within one cloud
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub cloud: Cloud,
    /// Region to query; `None` means the provider lists globally
    pub region: Option<String>,
}

impl Scope {
    pub fn global(cloud: Cloud) -> Self {
        Self { cloud, region: None }
    }

    pub fn region(cloud: Cloud, region: impl Into<String>) -> Self {
        Self {
            cloud,
            region: Some(region.into()),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}/{}", self.cloud, region),
            None => write!(f, "{}", self.cloud),
        }
    }
}

/// Everything a backend needs to launch one instance of a group
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub deployment_id: String,
    pub group: Arc<GroupSpec>,
    /// Resolved provider instance type
    pub instance_type: String,
    /// Position of this instance among the group's pending creates
    pub index: u32,
    /// Name to give the instance where the provider does not assign ids
    pub name: String,
}

impl CreateRequest {
    /// Expand a group deficit into one request per missing instance.
    ///
    /// Sizing is resolved here so a bad declaration fails before any
    /// provider call.
    pub fn for_group(
        deployment_id: &str,
        group: GroupSpec,
        count: u32,
        defaults: &Defaults,
    ) -> Result<Vec<CreateRequest>, ConfigError> {
        let instance_type = group.instance_type(defaults)?;
        let group = Arc::new(group);
        Ok((0..count)
            .map(|index| CreateRequest {
                deployment_id: deployment_id.to_string(),
                group: Arc::clone(&group),
                instance_type: instance_type.clone(),
                index,
                name: instance_name(deployment_id),
            })
            .collect())
    }

    pub fn cloud(&self) -> Cloud {
        self.group.cloud
    }

    /// Tags/labels written on the instance so a later `list` can rebuild an
    /// equivalent [`InstanceRecord`]. User tags never shadow these keys.
    pub fn instance_tags(&self) -> BTreeMap<String, String> {
        let group = &self.group;
        let mut tags = group.tags.clone();
        let inventory_groups: Vec<String> = group.instance_inventory_groups().into_iter().collect();
        tags.insert("deployment_id".into(), self.deployment_id.clone());
        tags.insert("ansible_user".into(), group.user.clone());
        tags.insert("cluster_name".into(), group.cluster_name.clone());
        tags.insert("group_name".into(), group.group_name.clone());
        tags.insert(
            "inventory_groups".into(),
            serde_json::to_string(&inventory_groups).unwrap_or_else(|_| "[]".into()),
        );
        tags.insert("extra_vars".into(), extra_vars_tag(&group.extra_vars));
        tags
    }

    /// The record this request is expected to produce, before addresses are
    /// known.
    pub fn pending_record(&self, id: impl Into<String>) -> InstanceRecord {
        let group = &self.group;
        InstanceRecord {
            id: id.into(),
            cloud: group.cloud,
            region: group.region.clone(),
            zone: group.zone.clone(),
            public_ip: String::new(),
            public_hostname: String::new(),
            private_ip: String::new(),
            private_hostname: String::new(),
            ansible_user: group.user.clone(),
            inventory_groups: group.instance_inventory_groups(),
            cluster_name: group.cluster_name.clone(),
            group_name: group.group_name.clone(),
            extra_vars: group.extra_vars.clone(),
        }
    }
}

fn extra_vars_tag(extra_vars: &serde_json::Value) -> String {
    if extra_vars.is_null() {
        "{}".to_string()
    } else {
        extra_vars.to_string()
    }
}

/// `{deployment_id}-{16 random digits}`
pub fn instance_name(deployment_id: &str) -> String {
    let n: u64 = rand::thread_rng().gen_range(0..10_000_000_000_000_000);
    format!("{}-{:016}", deployment_id, n)
}

/// Polling configuration for readiness waits
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Give up after this long
    pub timeout: Duration,
    /// Delay between two state checks
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// The set of configured backends, one per cloud
#[derive(Clone, Default)]
pub struct Backends {
    backends: HashMap<Cloud, Arc<dyn ProvisioningBackend>>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, replacing any previous one for the same cloud.
    pub fn insert(&mut self, backend: Arc<dyn ProvisioningBackend>) {
        self.backends.insert(backend.cloud(), backend);
    }

    pub fn with(mut self, backend: Arc<dyn ProvisioningBackend>) -> Self {
        self.insert(backend);
        self
    }

    pub fn get(&self, cloud: Cloud) -> BackendResult<Arc<dyn ProvisioningBackend>> {
        self.backends
            .get(&cloud)
            .cloned()
            .ok_or(BackendError::ProviderNotFound(cloud))
    }

    /// Configured backends in a stable cloud order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ProvisioningBackend>> {
        Cloud::ALL.iter().filter_map(|cloud| self.backends.get(cloud))
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clouds: Vec<Cloud> = self.iter().map(|b| b.cloud()).collect();
        f.debug_struct("Backends").field("clouds", &clouds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group() -> GroupSpec {
        let decl = json!({
            "group_name": "nodes",
            "cloud": "aws",
            "region": "us-east-1",
            "zone": "a",
            "instance": {"cpu": 4},
            "inventory_groups": ["nodes"],
            "tags": {"owner": "ops", "cluster_name": "spoofed"},
            "user": "ubuntu",
            "extra_vars": {"x": 1}
        });
        let serde_json::Value::Object(decl) = decl else {
            unreachable!()
        };
        GroupSpec::from_declaration("db-0", &decl).unwrap()
    }

    fn defaults() -> Defaults {
        serde_json::from_value(json!({"instances": {"aws": {"4": {"default": "m6i.xlarge"}}}}))
            .unwrap()
    }

    #[test]
    fn test_for_group_expands_count() {
        let requests = CreateRequest::for_group("dep", group(), 3, &defaults()).unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(requests.iter().all(|r| r.instance_type == "m6i.xlarge"));
        assert!(requests[0].name.starts_with("dep-"));
    }

    #[test]
    fn test_for_group_unknown_size() {
        let result = CreateRequest::for_group("dep", group(), 1, &Defaults::default());
        assert!(matches!(result, Err(ConfigError::UnknownInstanceType { .. })));
    }

    #[test]
    fn test_instance_tags() {
        let request = CreateRequest::for_group("dep", group(), 1, &defaults())
            .unwrap()
            .remove(0);
        let tags = request.instance_tags();

        assert_eq!(tags["deployment_id"], "dep");
        assert_eq!(tags["cluster_name"], "db-0");
        assert_eq!(tags["group_name"], "nodes");
        assert_eq!(tags["ansible_user"], "ubuntu");
        assert_eq!(tags["owner"], "ops");
        assert_eq!(tags["inventory_groups"], r#"["db-0","nodes"]"#);
        assert_eq!(tags["extra_vars"], r#"{"x":1}"#);
    }

    #[test]
    fn test_instance_name_format() {
        let name = instance_name("dep");
        let suffix = name.strip_prefix("dep-").unwrap();
        assert_eq!(suffix.len(), 16);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(Scope::global(Cloud::Gcp).to_string(), "gcp");
        assert_eq!(Scope::region(Cloud::Aws, "eu-west-1").to_string(), "aws/eu-west-1");
    }
}
