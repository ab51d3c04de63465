use crate::output;
use colored::Colorize;
use vmfleet_cloud::Fleet;
use vmfleet_core::load_deployment;

pub async fn handle(fleet: &Fleet, deployment: &str) -> anyhow::Result<()> {
    let clusters = load_deployment(deployment)?;
    let plan = fleet.plan(&clusters).await.map_err(output::report)?;

    eprintln!("Plan: {}", plan.summary().to_string().cyan());
    let surplus = plan.surplus();
    for instance in &surplus {
        eprintln!("  {} {}", "-".red(), instance);
    }
    output::print_instances(&surplus)
}
