//! Instance resize workflow
//!
//! Each instance goes `running -> stop -> stopped -> resize -> start ->
//! running`. A failed step ends that instance's workflow and leaves it where
//! it is; nothing is reverted to its previous size.

use crate::accumulator::{Accumulator, Outcome};
use crate::backend::{Backends, ProvisioningBackend};
use crate::error::BackendResult;
use crate::limit::Limiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{Instrument, info, info_span, warn};
use vmfleet_core::{ConfigError, Defaults, InstanceRecord, InstanceState};

/// How instances are walked through the resize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyMode {
    /// All at once, joined before returning
    Parallel,
    /// One after another in input order with `pause` between two instances
    Sequential { pause: Duration },
}

/// New sizing for the selected instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeTarget {
    pub cpu: u32,
    /// Memory tier looked up in the defaults table
    pub mem: String,
}

impl ResizeTarget {
    pub fn new(cpu: u32) -> Self {
        Self {
            cpu,
            mem: vmfleet_core::DEFAULT_MEM_TIER.to_string(),
        }
    }

    pub fn with_mem(mut self, mem: impl Into<String>) -> Self {
        self.mem = mem.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct ModifyWorkflow {
    backends: Backends,
    limiter: Limiter,
}

impl ModifyWorkflow {
    pub fn new(backends: Backends, limiter: Limiter) -> Self {
        Self { backends, limiter }
    }

    /// Resolve the instance type for every instance from its own cloud.
    ///
    /// Runs before any provider call so a missing defaults entry aborts the
    /// whole operation.
    pub fn plan(
        instances: Vec<InstanceRecord>,
        target: &ResizeTarget,
        defaults: &Defaults,
    ) -> Result<Vec<(InstanceRecord, String)>, ConfigError> {
        instances
            .into_iter()
            .map(|instance| {
                let instance_type = defaults
                    .instance_type(instance.cloud, target.cpu, &target.mem)?
                    .to_string();
                Ok((instance, instance_type))
            })
            .collect()
    }

    /// Resize the planned instances. Successfully resized instances come
    /// back in `instances`; every failure is one entry in `errors`.
    pub async fn execute(&self, planned: Vec<(InstanceRecord, String)>, mode: ModifyMode) -> Outcome {
        info!(count = planned.len(), ?mode, "Modifying instances");
        match mode {
            ModifyMode::Sequential { pause } => self.execute_sequential(planned, pause).await,
            ModifyMode::Parallel => self.execute_parallel(planned).await,
        }
    }

    async fn execute_sequential(&self, planned: Vec<(InstanceRecord, String)>, pause: Duration) -> Outcome {
        let acc = Accumulator::new();
        for (position, (instance, instance_type)) in planned.into_iter().enumerate() {
            if position > 0 && !pause.is_zero() {
                info!(seconds = pause.as_secs_f64(), "Pausing before next instance");
                tokio::time::sleep(pause).await;
            }
            let span = info_span!("modify", id = %instance.id, instance_type = %instance_type);
            resize_recorded(&self.backends, instance, instance_type, &acc)
                .instrument(span)
                .await;
        }
        acc.finish()
    }

    async fn execute_parallel(&self, planned: Vec<(InstanceRecord, String)>) -> Outcome {
        let acc = Accumulator::shared();
        let mut tasks = JoinSet::new();
        for (instance, instance_type) in planned {
            let backends = self.backends.clone();
            let limiter = self.limiter.clone();
            let acc = Arc::clone(&acc);
            let span = info_span!("modify", id = %instance.id, instance_type = %instance_type);
            tasks.spawn(
                async move {
                    let _permit = limiter.acquire().await;
                    resize_recorded(&backends, instance, instance_type, &acc).await;
                }
                .instrument(span),
            );
        }
        acc.join_all(tasks).await;
        acc.into_outcome()
    }
}

async fn resize_recorded(backends: &Backends, instance: InstanceRecord, instance_type: String, acc: &Accumulator) {
    let result = match backends.get(instance.cloud) {
        Ok(backend) => resize_one(backend.as_ref(), &instance, &instance_type).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            info!("Resized");
            acc.push_instance(instance);
        }
        Err(e) => {
            warn!(error = %e, "Resize failed");
            acc.push_error(format!("modify {} to {}: {}", instance, instance_type, e));
        }
    }
}

async fn resize_one(
    backend: &dyn ProvisioningBackend,
    instance: &InstanceRecord,
    instance_type: &str,
) -> BackendResult<()> {
    backend.stop(instance).await?;
    backend.wait_until(instance, InstanceState::Stopped).await?;
    backend.modify_size(instance, instance_type).await?;
    backend.start(instance).await?;
    backend.wait_until(instance, InstanceState::Running).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use serde_json::json;
    use std::collections::BTreeSet;
    use vmfleet_core::Cloud;

    fn record(id: &str, cloud: Cloud) -> InstanceRecord {
        InstanceRecord {
            id: id.to_string(),
            cloud,
            region: "us-east-1".to_string(),
            zone: "a".to_string(),
            public_ip: String::new(),
            public_hostname: String::new(),
            private_ip: String::new(),
            private_hostname: String::new(),
            ansible_user: "ubuntu".to_string(),
            inventory_groups: BTreeSet::from(["nodes".to_string()]),
            cluster_name: "db-0".to_string(),
            group_name: "nodes".to_string(),
            extra_vars: serde_json::Value::Null,
        }
    }

    fn defaults() -> Defaults {
        serde_json::from_value(json!({
            "instances": {
                "aws": {"8": {"default": "m6i.2xlarge", "high": "r6i.2xlarge"}},
                "gcp": {"8": {"default": "n2-standard-8"}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_plan_resolves_per_cloud() {
        let planned = ModifyWorkflow::plan(
            vec![record("i-1", Cloud::Aws), record("g-1", Cloud::Gcp)],
            &ResizeTarget::new(8),
            &defaults(),
        )
        .unwrap();
        assert_eq!(planned[0].1, "m6i.2xlarge");
        assert_eq!(planned[1].1, "n2-standard-8");

        let planned = ModifyWorkflow::plan(
            vec![record("i-1", Cloud::Aws)],
            &ResizeTarget::new(8).with_mem("high"),
            &defaults(),
        )
        .unwrap();
        assert_eq!(planned[0].1, "r6i.2xlarge");
    }

    #[test]
    fn test_plan_unknown_size_fails() {
        let result = ModifyWorkflow::plan(
            vec![record("vm-1", Cloud::Azure)],
            &ResizeTarget::new(8),
            &defaults(),
        );
        assert!(matches!(result, Err(ConfigError::UnknownInstanceType { .. })));
    }

    #[tokio::test]
    async fn test_failed_step_stops_that_instance_only() {
        let aws = Arc::new(MemoryBackend::new(Cloud::Aws));
        aws.seed("dep", record("i-1", Cloud::Aws), "m6i.xlarge");
        aws.seed("dep", record("i-2", Cloud::Aws), "m6i.xlarge");
        aws.fail("resize", "i-1");

        let workflow = ModifyWorkflow::new(Backends::new().with(aws.clone()), Limiter::unbounded());
        let planned = ModifyWorkflow::plan(
            vec![record("i-1", Cloud::Aws), record("i-2", Cloud::Aws)],
            &ResizeTarget::new(8),
            &defaults(),
        )
        .unwrap();
        let outcome = workflow.execute(planned, ModifyMode::Parallel).await;

        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("modify aws/i-1"));
        // left stopped at its old size
        assert_eq!(aws.state_of("i-1"), Some(InstanceState::Stopped));
        assert_eq!(aws.instance_type_of("i-1").as_deref(), Some("m6i.xlarge"));
        assert_eq!(aws.state_of("i-2"), Some(InstanceState::Running));
        assert_eq!(aws.instance_type_of("i-2").as_deref(), Some("m6i.2xlarge"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_follows_input_order() {
        let aws = Arc::new(MemoryBackend::new(Cloud::Aws).with_latency(Duration::from_secs(1)));
        let input = ["i-3", "i-1", "i-2"];
        for id in input {
            aws.seed("dep", record(id, Cloud::Aws), "m6i.xlarge");
        }

        let workflow = ModifyWorkflow::new(Backends::new().with(aws.clone()), Limiter::unbounded());
        let planned = ModifyWorkflow::plan(
            input.iter().map(|id| record(id, Cloud::Aws)).collect(),
            &ResizeTarget::new(8),
            &defaults(),
        )
        .unwrap();

        let started = tokio::time::Instant::now();
        let outcome = workflow
            .execute(planned, ModifyMode::Sequential { pause: Duration::from_secs(2) })
            .await;

        assert!(outcome.is_success());
        // five calls per instance, two pauses
        assert!(started.elapsed() >= Duration::from_secs(3 * 5 + 2 * 2));
        let ids: Vec<_> = outcome.instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, input);
        assert_eq!(
            aws.calls(),
            vec![
                "stop i-3", "resize i-3", "start i-3", "stop i-1", "resize i-1", "start i-1", "stop i-2",
                "resize i-2", "start i-2",
            ]
        );
    }
}
