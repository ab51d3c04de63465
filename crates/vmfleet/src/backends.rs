//! Backend wiring from tool settings

use std::sync::Arc;
use vmfleet_cloud::{Backends, Fleet, WaitConfig};
use vmfleet_cloud_exec::{ExecBackend, Helper};
use vmfleet_config::Settings;
use vmfleet_core::Cloud;

/// One exec backend per queried cloud.
pub fn build_backends(settings: &Settings) -> Backends {
    let wait = WaitConfig {
        timeout: settings.wait.timeout(),
        poll_interval: settings.wait.poll_interval(),
    };

    let mut backends = Backends::new();
    for cloud in settings.queried_clouds() {
        let mut helper =
            Helper::new(settings.program(cloud)).with_args(settings.cloud(cloud).args.clone());
        let mut regions = Vec::new();
        match cloud {
            Cloud::Aws => regions = settings.scopes.aws_regions.clone(),
            Cloud::Gcp => {
                if let Some(project) = &settings.scopes.gcp_project {
                    helper = helper.with_option("project", project.clone());
                }
            }
            Cloud::Azure => {
                if let Some(group) = &settings.scopes.azure_resource_group {
                    helper = helper.with_option("resource-group", group.clone());
                }
                if let Some(subscription) = &settings.scopes.azure_subscription_id {
                    helper = helper.with_option("subscription-id", subscription.clone());
                }
            }
        }
        tracing::debug!(%cloud, program = helper.program(), "Backend configured");
        let backend = ExecBackend::new(cloud, helper)
            .with_regions(regions)
            .with_wait(wait.clone());
        backends.insert(Arc::new(backend));
    }
    backends
}

/// Load settings and build the fleet for `deployment_id`.
///
/// `max_concurrency` from the command line wins over the settings file.
pub fn load_fleet(deployment_id: &str, max_concurrency: Option<usize>) -> anyhow::Result<Fleet> {
    let settings = vmfleet_config::load_settings()?;
    let backends = build_backends(&settings);
    if backends.is_empty() {
        tracing::warn!("No cloud is configured; nothing will be listed");
    }
    Ok(Fleet::new(deployment_id, backends)
        .with_max_concurrency(max_concurrency.or(settings.max_concurrency)))
}
