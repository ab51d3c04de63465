use crate::output;
use vmfleet_cloud::Fleet;

pub async fn handle(fleet: &Fleet) -> anyhow::Result<()> {
    output::step(&format!("Gathering deployment {}...", fleet.deployment_id()));
    let instances = fleet.gather().await.map_err(output::report)?;
    output::success(&format!("{} instance(s)", instances.len()));
    output::print_instances(&instances)
}
