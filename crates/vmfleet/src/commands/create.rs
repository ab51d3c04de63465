use crate::output;
use vmfleet_cloud::{CreateOptions, Fleet};
use vmfleet_core::{load_defaults, load_deployment};

pub async fn handle(
    fleet: &Fleet,
    deployment: &str,
    defaults: &str,
    preserve: bool,
) -> anyhow::Result<()> {
    let clusters = load_deployment(deployment)?;
    let defaults = load_defaults(defaults)?;

    output::step(&format!("Reconciling deployment {}...", fleet.deployment_id()));
    let instances = fleet
        .create(&clusters, &defaults, CreateOptions { preserve })
        .await
        .map_err(output::report)?;

    output::success(&format!(
        "Deployment {} up to date ({} instance(s))",
        fleet.deployment_id(),
        instances.len()
    ));
    output::print_instances(&instances)
}
