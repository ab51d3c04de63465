//! ProvisioningBackend over a helper executable

use crate::helper::{CreatePayload, Helper};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};
use vmfleet_cloud::{BackendError, BackendResult, CreateRequest, ProvisioningBackend, Scope, WaitConfig};
use vmfleet_core::{Cloud, InstanceRecord, InstanceState};

/// Backend for one cloud, driving that cloud's helper program
#[derive(Debug, Clone)]
pub struct ExecBackend {
    cloud: Cloud,
    helper: Helper,
    /// Regions to list in; empty asks the helper (AWS only)
    regions: Vec<String>,
    wait: WaitConfig,
}

impl ExecBackend {
    pub fn new(cloud: Cloud, helper: Helper) -> Self {
        Self {
            cloud,
            helper,
            regions: Vec::new(),
            wait: WaitConfig::default(),
        }
    }

    pub fn with_regions(mut self, regions: Vec<String>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }
}

#[async_trait]
impl ProvisioningBackend for ExecBackend {
    fn cloud(&self) -> Cloud {
        self.cloud
    }

    async fn scopes(&self) -> BackendResult<Vec<Scope>> {
        if self.cloud != Cloud::Aws {
            return Ok(vec![Scope::global(self.cloud)]);
        }
        let regions = if self.regions.is_empty() {
            self.helper.regions().await?
        } else {
            self.regions.clone()
        };
        debug!(count = regions.len(), "Resolved regions");
        Ok(regions
            .into_iter()
            .map(|region| Scope::region(self.cloud, region))
            .collect())
    }

    async fn list(&self, deployment_id: &str, scope: &Scope) -> BackendResult<Vec<InstanceRecord>> {
        let instances = self
            .helper
            .list(deployment_id, scope.region.as_deref())
            .await?;
        Ok(instances
            .into_iter()
            .filter(|i| i.state.is_live())
            .map(|i| i.record)
            .collect())
    }

    async fn create(&self, request: &CreateRequest) -> BackendResult<InstanceRecord> {
        let payload = CreatePayload {
            deployment_id: &request.deployment_id,
            name: &request.name,
            index: request.index,
            instance_type: &request.instance_type,
            tags: request.instance_tags(),
            group: &request.group,
        };
        info!(name = %request.name, instance_type = %request.instance_type, "Creating instance");
        let created = self.helper.create(&payload).await?;
        Ok(created.record)
    }

    async fn describe(&self, instance: &InstanceRecord) -> BackendResult<InstanceRecord> {
        self.helper
            .describe(instance)
            .await?
            .map(|found| found.record)
            .ok_or_else(|| BackendError::InstanceNotFound(instance.id.clone()))
    }

    /// Poll `describe` until the instance reports `target`.
    ///
    /// Waiting for `running` keeps polling through `stopped`/`stopping` (a
    /// start may not be visible yet) and fails only once the instance is
    /// going away. Waiting for `terminated` succeeds when the instance is
    /// gone from `describe`.
    async fn wait_until(&self, instance: &InstanceRecord, target: InstanceState) -> BackendResult<()> {
        let deadline = Instant::now() + self.wait.timeout;
        loop {
            let state = match self.helper.describe(instance).await? {
                Some(found) => found.state,
                None if target == InstanceState::Terminated => {
                    debug!(id = %instance.id, "Instance gone");
                    return Ok(());
                }
                None => return Err(BackendError::InstanceNotFound(instance.id.clone())),
            };
            if state == target {
                debug!(id = %instance.id, %state, "Reached state");
                return Ok(());
            }
            let going_away = matches!(state, InstanceState::Terminating | InstanceState::Terminated);
            if target == InstanceState::Running && going_away {
                return Err(BackendError::ApiError(format!(
                    "instance {} is {} and will not become running",
                    instance.id, state
                )));
            }
            if Instant::now() + self.wait.poll_interval > deadline {
                return Err(BackendError::Timeout(format!(
                    "instance {} still {} after {}s waiting for {}",
                    instance.id,
                    state,
                    self.wait.timeout.as_secs(),
                    target
                )));
            }
            debug!(id = %instance.id, %state, %target, "Waiting");
            sleep(self.wait.poll_interval.max(Duration::from_millis(10))).await;
        }
    }

    async fn delete(&self, instance: &InstanceRecord) -> BackendResult<()> {
        info!(id = %instance.id, "Deleting instance");
        Ok(self.helper.delete(instance).await?)
    }

    async fn stop(&self, instance: &InstanceRecord) -> BackendResult<()> {
        Ok(self.helper.stop(instance).await?)
    }

    async fn start(&self, instance: &InstanceRecord) -> BackendResult<()> {
        Ok(self.helper.start(instance).await?)
    }

    async fn modify_size(&self, instance: &InstanceRecord, instance_type: &str) -> BackendResult<()> {
        info!(id = %instance.id, instance_type, "Resizing instance");
        Ok(self.helper.resize(instance, instance_type).await?)
    }
}
