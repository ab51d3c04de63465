use crate::output;
use std::time::Duration;
use vmfleet_cloud::{Fleet, ModifyMode, ModifyRequest, ResizeTarget};
use vmfleet_core::load_defaults;

/// Command-line form of a [`ModifyRequest`]
pub struct ModifyArgs {
    pub groups: Vec<String>,
    pub cpu: u32,
    pub mem: Option<String>,
    pub sequential: bool,
    pub pause: u64,
}

impl ModifyArgs {
    fn into_request(self) -> ModifyRequest {
        let mut target = ResizeTarget::new(self.cpu);
        if let Some(mem) = self.mem {
            target = target.with_mem(mem);
        }
        let mode = if self.sequential {
            ModifyMode::Sequential {
                pause: Duration::from_secs(self.pause),
            }
        } else {
            ModifyMode::Parallel
        };
        ModifyRequest {
            groups: self.groups,
            target,
            mode,
        }
    }
}

pub async fn handle(fleet: &Fleet, args: ModifyArgs, defaults: &str) -> anyhow::Result<()> {
    let defaults = load_defaults(defaults)?;
    let request = args.into_request();

    output::step(&format!(
        "Resizing [{}] in {} to {} cpu...",
        request.groups.join(", "),
        fleet.deployment_id(),
        request.target.cpu
    ));
    let resized = fleet
        .modify(&request, &defaults)
        .await
        .map_err(output::report)?;

    output::success(&format!("{} instance(s) resized", resized.len()));
    output::print_instances(&resized)
}
