use crate::output;
use vmfleet_cloud::Fleet;

pub async fn handle(fleet: &Fleet) -> anyhow::Result<()> {
    output::step(&format!("Destroying deployment {}...", fleet.deployment_id()));
    fleet.destroy().await.map_err(output::report)?;
    output::success(&format!("Deployment {} destroyed", fleet.deployment_id()));
    Ok(())
}
