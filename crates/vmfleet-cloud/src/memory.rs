//! In-memory provisioning backend
//!
//! Keeps instances in a map and walks them through the same lifecycle states
//! a real provider would, so orchestration code can be exercised without a
//! cloud account. Every mutating call is recorded in order.

use crate::backend::{CreateRequest, ProvisioningBackend, Scope};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use vmfleet_core::{Cloud, InstanceRecord, InstanceState};

#[derive(Debug, Clone)]
struct StoredInstance {
    record: InstanceRecord,
    deployment_id: String,
    instance_type: String,
    state: InstanceState,
}

#[derive(Debug, Default)]
struct MemoryState {
    instances: BTreeMap<String, StoredInstance>,
    calls: Vec<String>,
    failures: HashSet<(String, String)>,
    addresses: u32,
}

/// A fake cloud held entirely in process memory
#[derive(Debug)]
pub struct MemoryBackend {
    cloud: Cloud,
    regions: Vec<String>,
    latency: Option<Duration>,
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new(cloud: Cloud) -> Self {
        Self {
            cloud,
            regions: Vec::new(),
            latency: None,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// List per region instead of globally.
    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add an already running instance.
    pub fn seed(&self, deployment_id: &str, record: InstanceRecord, instance_type: &str) {
        self.lock().instances.insert(
            record.id.clone(),
            StoredInstance {
                record,
                deployment_id: deployment_id.to_string(),
                instance_type: instance_type.to_string(),
                state: InstanceState::Running,
            },
        );
    }

    /// Make `operation` fail for `target` from now on.
    ///
    /// The target is the scope for `list` (`aws/us-east-1`, `gcp`), the
    /// group name for `create` and the instance id for everything else.
    pub fn fail(&self, operation: &str, target: &str) {
        self.lock()
            .failures
            .insert((operation.to_string(), target.to_string()));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Mutating calls in the order they happened, as `"<op> <id>"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn state_of(&self, id: &str) -> Option<InstanceState> {
        self.lock().instances.get(id).map(|s| s.state)
    }

    pub fn instance_type_of(&self, id: &str) -> Option<String> {
        self.lock().instances.get(id).map(|s| s.instance_type.clone())
    }

    /// Number of instances in a live state
    pub fn live_count(&self) -> usize {
        self.lock()
            .instances
            .values()
            .filter(|s| s.state.is_live())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_failure(state: &MemoryState, operation: &str, target: &str) -> BackendResult<()> {
        if state
            .failures
            .contains(&(operation.to_string(), target.to_string()))
        {
            return Err(BackendError::ApiError(format!(
                "injected {} failure for {}",
                operation, target
            )));
        }
        Ok(())
    }

    /// Record a state transition after checking failure injection and the
    /// allowed source states.
    fn transition(
        &self,
        operation: &str,
        id: &str,
        allowed: &[InstanceState],
        next: InstanceState,
    ) -> BackendResult<()> {
        let mut state = self.lock();
        Self::check_failure(&state, operation, id)?;
        let stored = state
            .instances
            .get_mut(id)
            .ok_or_else(|| BackendError::InstanceNotFound(id.to_string()))?;
        if !allowed.contains(&stored.state) {
            return Err(BackendError::InvalidRequest(format!(
                "cannot {} instance {} while {}",
                operation, id, stored.state
            )));
        }
        stored.state = next;
        state.calls.push(format!("{} {}", operation, id));
        Ok(())
    }
}

#[async_trait]
impl ProvisioningBackend for MemoryBackend {
    fn cloud(&self) -> Cloud {
        self.cloud
    }

    async fn scopes(&self) -> BackendResult<Vec<Scope>> {
        if self.regions.is_empty() {
            Ok(vec![Scope::global(self.cloud)])
        } else {
            Ok(self
                .regions
                .iter()
                .map(|region| Scope::region(self.cloud, region.clone()))
                .collect())
        }
    }

    async fn list(&self, deployment_id: &str, scope: &Scope) -> BackendResult<Vec<InstanceRecord>> {
        self.delay().await;
        let state = self.lock();
        Self::check_failure(&state, "list", &scope.to_string())?;
        Ok(state
            .instances
            .values()
            .filter(|s| s.deployment_id == deployment_id && s.state.is_live())
            .filter(|s| scope.region.as_ref().is_none_or(|r| *r == s.record.region))
            .map(|s| s.record.clone())
            .collect())
    }

    async fn create(&self, request: &CreateRequest) -> BackendResult<InstanceRecord> {
        self.delay().await;
        let mut state = self.lock();
        Self::check_failure(&state, "create", &request.group.group_name)?;
        let record = request.pending_record(request.name.clone());
        state.instances.insert(
            record.id.clone(),
            StoredInstance {
                record: record.clone(),
                deployment_id: request.deployment_id.clone(),
                instance_type: request.instance_type.clone(),
                state: InstanceState::Pending,
            },
        );
        state.calls.push(format!("create {}", record.id));
        Ok(record)
    }

    async fn describe(&self, instance: &InstanceRecord) -> BackendResult<InstanceRecord> {
        self.delay().await;
        let mut guard = self.lock();
        let state = &mut *guard;
        Self::check_failure(state, "describe", &instance.id)?;
        let stored = state
            .instances
            .get_mut(&instance.id)
            .ok_or_else(|| BackendError::InstanceNotFound(instance.id.clone()))?;
        if stored.record.private_ip.is_empty() {
            state.addresses += 1;
            let n = state.addresses;
            stored.record.private_ip = format!("10.0.{}.{}", n / 256, n % 256);
            stored.record.private_hostname = format!("ip-10-0-{}-{}.internal", n / 256, n % 256);
        }
        Ok(stored.record.clone())
    }

    async fn wait_until(&self, instance: &InstanceRecord, target: InstanceState) -> BackendResult<()> {
        self.delay().await;
        let mut state = self.lock();
        Self::check_failure(&state, "wait", &instance.id)?;
        let stored = state
            .instances
            .get_mut(&instance.id)
            .ok_or_else(|| BackendError::InstanceNotFound(instance.id.clone()))?;
        use InstanceState::*;
        match (stored.state, target) {
            (current, target) if current == target => Ok(()),
            (Pending, Running) | (Stopping, Stopped) | (Terminating, Terminated) => {
                stored.state = target;
                Ok(())
            }
            (current, target) => Err(BackendError::Timeout(format!(
                "instance {} is {} and will never become {}",
                instance.id, current, target
            ))),
        }
    }

    async fn delete(&self, instance: &InstanceRecord) -> BackendResult<()> {
        self.delay().await;
        use InstanceState::*;
        self.transition(
            "delete",
            &instance.id,
            &[Pending, Running, Stopping, Stopped],
            Terminating,
        )
    }

    async fn stop(&self, instance: &InstanceRecord) -> BackendResult<()> {
        self.delay().await;
        self.transition(
            "stop",
            &instance.id,
            &[InstanceState::Running],
            InstanceState::Stopping,
        )
    }

    async fn start(&self, instance: &InstanceRecord) -> BackendResult<()> {
        self.delay().await;
        self.transition(
            "start",
            &instance.id,
            &[InstanceState::Stopped],
            InstanceState::Pending,
        )
    }

    async fn modify_size(&self, instance: &InstanceRecord, instance_type: &str) -> BackendResult<()> {
        self.delay().await;
        let mut state = self.lock();
        Self::check_failure(&state, "resize", &instance.id)?;
        let stored = state
            .instances
            .get_mut(&instance.id)
            .ok_or_else(|| BackendError::InstanceNotFound(instance.id.clone()))?;
        if stored.state != InstanceState::Stopped {
            return Err(BackendError::InvalidRequest(format!(
                "instance {} must be stopped before resizing (is {})",
                instance.id, stored.state
            )));
        }
        stored.instance_type = instance_type.to_string();
        state.calls.push(format!("resize {}", instance.id));
        Ok(())
    }
}
