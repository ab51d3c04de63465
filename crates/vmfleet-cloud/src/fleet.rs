//! Deployment-level operations
//!
//! Each public method is one reconciliation pass (or a read-only part of
//! one): fetch, diff, act, then fail as a whole if any task failed. Nothing
//! is rolled back; re-running the same operation only acts on what is left.

use crate::accumulator::Outcome;
use crate::backend::{Backends, CreateRequest};
use crate::error::{AggregateError, Result};
use crate::fetch::FleetFetcher;
use crate::limit::Limiter;
use crate::modify::{ModifyMode, ModifyWorkflow, ResizeTarget};
use crate::orchestrator::Orchestrator;
use tracing::{info, instrument, warn};
use vmfleet_core::{ClusterSpec, Defaults, InstanceRecord, Reconciliation, reconcile, resolve_groups};

/// Options for [`Fleet::create`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Keep surplus instances instead of deleting them
    pub preserve: bool,
}

/// Parameters of [`Fleet::modify`]
#[derive(Debug, Clone)]
pub struct ModifyRequest {
    /// Inventory groups to select; empty selects every instance
    pub groups: Vec<String>,
    pub target: ResizeTarget,
    pub mode: ModifyMode,
}

/// Operations on one deployment
#[derive(Debug, Clone)]
pub struct Fleet {
    deployment_id: String,
    backends: Backends,
    limiter: Limiter,
}

impl Fleet {
    pub fn new(deployment_id: impl Into<String>, backends: Backends) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            backends,
            limiter: Limiter::unbounded(),
        }
    }

    /// Bound the number of provider calls in flight at once.
    pub fn with_max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
        self.limiter = Limiter::new(max_concurrency);
        self
    }

    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    fn fetcher(&self) -> FleetFetcher {
        FleetFetcher::new(self.backends.clone(), self.limiter.clone())
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.backends.clone(), self.limiter.clone())
    }

    /// Current live instances, sorted by id.
    #[instrument(skip(self), fields(deployment_id = %self.deployment_id))]
    pub async fn gather(&self) -> Result<Vec<InstanceRecord>> {
        Ok(self.fetcher().fetch_all(&self.deployment_id).await?)
    }

    /// Fetch and diff without acting.
    #[instrument(skip_all, fields(deployment_id = %self.deployment_id))]
    pub async fn plan(&self, clusters: &[ClusterSpec]) -> Result<Reconciliation> {
        resolve_groups(&self.deployment_id, clusters)?;
        let current = self.gather().await?;
        let plan = reconcile(&self.deployment_id, clusters, &current)?;
        info!(summary = %plan.summary(), "Planned");
        Ok(plan)
    }

    /// Instances a `create` would delete.
    pub async fn to_be_deleted(&self, clusters: &[ClusterSpec]) -> Result<Vec<InstanceRecord>> {
        Ok(self.plan(clusters).await?.surplus())
    }

    /// Bring the deployment to its declared state.
    ///
    /// Returns the created and kept instances, plus the surplus when
    /// `preserve` is set.
    #[instrument(skip_all, fields(deployment_id = %self.deployment_id, preserve = options.preserve))]
    pub async fn create(
        &self,
        clusters: &[ClusterSpec],
        defaults: &Defaults,
        options: CreateOptions,
    ) -> Result<Vec<InstanceRecord>> {
        // declaration and sizing errors surface before any provider call
        for group in resolve_groups(&self.deployment_id, clusters)? {
            group.instance_type(defaults)?;
        }

        let current = self.gather().await?;
        let plan = reconcile(&self.deployment_id, clusters, &current)?;
        let summary = plan.summary();
        info!(%summary, "Reconciled");
        if !plan.has_changes() {
            info!("Nothing to create or delete");
        }

        let mut requests = Vec::new();
        for (group, count) in plan.to_create() {
            requests.extend(CreateRequest::for_group(&self.deployment_id, group, count, defaults)?);
        }
        let surplus = plan.surplus();

        let orchestrator = self.orchestrator();
        let (created, deleted) = if options.preserve {
            if !surplus.is_empty() {
                info!(count = surplus.len(), "Preserving surplus instances");
            }
            (orchestrator.create(requests).await, Outcome::default())
        } else {
            orchestrator.apply(requests, surplus.clone()).await
        };

        let mut errors = created.errors;
        errors.extend(deleted.errors);
        if !errors.is_empty() {
            warn!(errors = errors.len(), "Create finished with failures");
            return Err(AggregateError::new(errors).into());
        }

        let mut instances = created.instances;
        instances.extend(plan.kept());
        if options.preserve {
            instances.extend(surplus);
        }
        info!(
            created = summary.create,
            deleted = deleted.instances.len(),
            total = instances.len(),
            "Deployment up to date"
        );
        Ok(instances)
    }

    /// Delete every instance of the deployment.
    #[instrument(skip(self), fields(deployment_id = %self.deployment_id))]
    pub async fn destroy(&self) -> Result<()> {
        let current = self.gather().await?;
        info!(count = current.len(), "Destroying deployment");
        let outcome = self.orchestrator().delete(current).await;
        outcome.into_result()?;
        Ok(())
    }

    /// Resize the instances in the selected inventory groups.
    ///
    /// Returns the instances that were resized.
    #[instrument(skip_all, fields(deployment_id = %self.deployment_id))]
    pub async fn modify(&self, request: &ModifyRequest, defaults: &Defaults) -> Result<Vec<InstanceRecord>> {
        let current = self.gather().await?;
        let selected: Vec<InstanceRecord> = if request.groups.is_empty() {
            current
        } else {
            current
                .into_iter()
                .filter(|i| i.in_any_group(&request.groups))
                .collect()
        };
        info!(selected = selected.len(), cpu = request.target.cpu, "Selected instances");

        let planned = ModifyWorkflow::plan(selected, &request.target, defaults)?;
        let workflow = ModifyWorkflow::new(self.backends.clone(), self.limiter.clone());
        let outcome = workflow.execute(planned, request.mode).await;
        Ok(outcome.into_result()?)
    }
}
