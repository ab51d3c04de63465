//! Concurrent fleet listing
//!
//! One task per configured cloud asks the backend for its scopes, then one
//! task per scope lists the deployment's live instances. Failures are
//! collected and never stop sibling tasks.

use crate::accumulator::{Accumulator, Outcome};
use crate::backend::{Backends, ProvisioningBackend};
use crate::error::AggregateError;
use crate::limit::Limiter;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};
use vmfleet_core::InstanceRecord;

#[derive(Debug, Clone)]
pub struct FleetFetcher {
    backends: Backends,
    limiter: Limiter,
}

impl FleetFetcher {
    pub fn new(backends: Backends, limiter: Limiter) -> Self {
        Self { backends, limiter }
    }

    /// List every live instance of `deployment_id`, sorted by id.
    ///
    /// Errors come back alongside whatever was listed; callers must not
    /// reconcile against a fetch that has errors.
    pub async fn fetch(&self, deployment_id: &str) -> Outcome {
        let acc = Accumulator::shared();
        let mut tasks = JoinSet::new();

        for backend in self.backends.iter() {
            let span = info_span!("fetch", cloud = %backend.cloud());
            tasks.spawn(
                fetch_cloud(
                    Arc::clone(backend),
                    deployment_id.to_string(),
                    Arc::clone(&acc),
                    self.limiter.clone(),
                )
                .instrument(span),
            );
        }
        acc.join_all(tasks).await;

        let mut outcome = acc.into_outcome();
        outcome.instances.sort_by(|a, b| a.id.cmp(&b.id));
        info!(
            deployment_id,
            instances = outcome.instances.len(),
            errors = outcome.errors.len(),
            "Fetched fleet"
        );
        outcome
    }

    /// [`fetch`](Self::fetch), failing as a whole when any scope failed.
    pub async fn fetch_all(&self, deployment_id: &str) -> Result<Vec<InstanceRecord>, AggregateError> {
        self.fetch(deployment_id).await.into_result()
    }
}

async fn fetch_cloud(
    backend: Arc<dyn ProvisioningBackend>,
    deployment_id: String,
    acc: Arc<Accumulator>,
    limiter: Limiter,
) {
    let cloud = backend.cloud();
    let scopes = match backend.scopes().await {
        Ok(scopes) => scopes,
        Err(e) => {
            warn!(error = %e, "Could not determine scopes");
            acc.push_error(format!("{}: {}", cloud, e));
            return;
        }
    };
    debug!(scopes = scopes.len(), "Listing scopes");

    let deployment_id: Arc<str> = Arc::from(deployment_id);
    let mut tasks = JoinSet::new();
    for scope in scopes {
        let backend = Arc::clone(&backend);
        let acc = Arc::clone(&acc);
        let limiter = limiter.clone();
        let deployment_id = Arc::clone(&deployment_id);
        let span = info_span!("list", scope = %scope);
        tasks.spawn(
            async move {
                let _permit = limiter.acquire().await;
                match backend.list(&deployment_id, &scope).await {
                    Ok(instances) => {
                        debug!(count = instances.len(), "Listed instances");
                        acc.push_instances(instances);
                    }
                    Err(e) => {
                        warn!(error = %e, "Listing failed");
                        acc.push_error(format!("{}: {}", scope, e));
                    }
                }
            }
            .instrument(span),
        );
    }
    acc.join_all(tasks).await;
}
