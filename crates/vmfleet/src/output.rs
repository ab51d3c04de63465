//! Terminal output
//!
//! The JSON result goes to stdout; everything meant for a person goes to
//! stderr.

use colored::Colorize;
use vmfleet_cloud::FleetError;
use vmfleet_core::InstanceRecord;

/// Print instances as a JSON array on stdout.
pub fn print_instances(instances: &[InstanceRecord]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(instances)?);
    Ok(())
}

pub fn success(message: &str) {
    eprintln!("{} {}", "✓".green(), message);
}

pub fn step(message: &str) {
    eprintln!("{}", message.blue());
}

/// Print each failure of `err` and turn it into the command's error.
pub fn report(err: FleetError) -> anyhow::Error {
    let messages = err.messages();
    eprintln!("{}", format!("✗ {} failure(s)", messages.len()).red().bold());
    for message in &messages {
        eprintln!("  {} {}", "•".red(), message);
    }
    match err {
        FleetError::Config(e) => anyhow::anyhow!("invalid declaration: {}", e),
        FleetError::Aggregate(e) => anyhow::anyhow!("{} operation(s) failed", e.errors.len()),
    }
}
