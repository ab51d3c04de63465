//! Concurrent create and delete execution
//!
//! Every scheduled operation runs exactly once in its own task. There are no
//! retries and no cancellation; a failure is recorded and siblings carry on.
//! Both fan-outs end at a join barrier before results are handed back.

use crate::accumulator::{Accumulator, Outcome};
use crate::backend::{Backends, CreateRequest, ProvisioningBackend};
use crate::error::BackendResult;
use crate::limit::Limiter;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};
use vmfleet_core::{InstanceRecord, InstanceState};

#[derive(Debug, Clone)]
pub struct Orchestrator {
    backends: Backends,
    limiter: Limiter,
}

impl Orchestrator {
    pub fn new(backends: Backends, limiter: Limiter) -> Self {
        Self { backends, limiter }
    }

    /// Launch one instance per request, wait for each to run, and collect the
    /// described records. Result order follows completion, not requests.
    pub async fn create(&self, requests: Vec<CreateRequest>) -> Outcome {
        if requests.is_empty() {
            return Outcome::default();
        }
        info!(count = requests.len(), "Creating instances");
        let acc = Accumulator::shared();
        let mut tasks = JoinSet::new();

        for request in requests {
            let label = format!(
                "create {}/{} in {}/{}",
                request.group.cluster_name,
                request.group.group_name,
                request.cloud(),
                request.group.region
            );
            let backend = match self.backends.get(request.cloud()) {
                Ok(backend) => backend,
                Err(e) => {
                    acc.push_error(format!("{}: {}", label, e));
                    continue;
                }
            };
            let acc = Arc::clone(&acc);
            let limiter = self.limiter.clone();
            let span = info_span!(
                "create",
                cloud = %request.cloud(),
                group = %request.group.group_name,
                index = request.index
            );
            tasks.spawn(
                async move {
                    let _permit = limiter.acquire().await;
                    match create_one(backend.as_ref(), &request).await {
                        Ok(instance) => {
                            debug!(id = %instance.id, "Instance running");
                            acc.push_instance(instance);
                        }
                        Err(e) => {
                            warn!(error = %e, "Create failed");
                            acc.push_error(format!("{}: {}", label, e));
                        }
                    }
                }
                .instrument(span),
            );
        }
        acc.join_all(tasks).await;
        acc.into_outcome()
    }

    /// Terminate every given instance and wait for the provider to confirm.
    pub async fn delete(&self, instances: Vec<InstanceRecord>) -> Outcome {
        if instances.is_empty() {
            return Outcome::default();
        }
        info!(count = instances.len(), "Deleting instances");
        let acc = Accumulator::shared();
        let mut tasks = JoinSet::new();

        for instance in instances {
            let label = format!("delete {}", instance);
            let backend = match self.backends.get(instance.cloud) {
                Ok(backend) => backend,
                Err(e) => {
                    acc.push_error(format!("{}: {}", label, e));
                    continue;
                }
            };
            let acc = Arc::clone(&acc);
            let limiter = self.limiter.clone();
            let span = info_span!(
                "delete",
                cloud = %instance.cloud,
                region = %instance.region,
                id = %instance.id
            );
            tasks.spawn(
                async move {
                    let _permit = limiter.acquire().await;
                    match delete_one(backend.as_ref(), &instance).await {
                        Ok(()) => {
                            debug!("Instance terminated");
                            acc.push_instance(instance);
                        }
                        Err(e) => {
                            warn!(error = %e, "Delete failed");
                            acc.push_error(format!("{}: {}", label, e));
                        }
                    }
                }
                .instrument(span),
            );
        }
        acc.join_all(tasks).await;
        acc.into_outcome()
    }

    /// Run both fan-outs at once. Returns `(created, deleted)`.
    pub async fn apply(
        &self,
        requests: Vec<CreateRequest>,
        surplus: Vec<InstanceRecord>,
    ) -> (Outcome, Outcome) {
        tokio::join!(self.create(requests), self.delete(surplus))
    }
}

async fn create_one(
    backend: &dyn ProvisioningBackend,
    request: &CreateRequest,
) -> BackendResult<InstanceRecord> {
    let pending = backend.create(request).await?;
    backend.wait_until(&pending, InstanceState::Running).await?;
    backend.describe(&pending).await
}

async fn delete_one(backend: &dyn ProvisioningBackend, instance: &InstanceRecord) -> BackendResult<()> {
    backend.delete(instance).await?;
    backend.wait_until(instance, InstanceState::Terminated).await
}
