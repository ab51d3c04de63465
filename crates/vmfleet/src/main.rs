mod backends;
mod commands;
mod output;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vmfleet")]
#[command(about = "Declarative VM fleets across AWS, GCP and Azure", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Maximum provider calls in flight (overrides the settings file)
    #[arg(long, global = true, env = "VMFLEET_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Deployment the command acts on
#[derive(Args)]
struct Target {
    /// Deployment id (instances are tagged with it)
    #[arg(short = 'i', long, env = "VMFLEET_DEPLOYMENT_ID")]
    deployment_id: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the live instances of a deployment
    Gather {
        #[command(flatten)]
        target: Target,
    },
    /// Create or reconcile a deployment to its declaration
    Create {
        #[command(flatten)]
        target: Target,
        /// Deployment declaration (JSON/YAML file or inline JSON)
        #[arg(short, long)]
        deployment: String,
        /// Instance type table (JSON/YAML file or inline JSON)
        #[arg(long)]
        defaults: String,
        /// Keep instances the declaration no longer asks for
        #[arg(long)]
        preserve: bool,
    },
    /// Print the instances a create would delete, without acting
    ToBeDeleted {
        #[command(flatten)]
        target: Target,
        /// Deployment declaration (JSON/YAML file or inline JSON)
        #[arg(short, long)]
        deployment: String,
    },
    /// Delete every instance of a deployment
    Destroy {
        #[command(flatten)]
        target: Target,
    },
    /// Change the instance type of the instances in some inventory groups
    Modify {
        #[command(flatten)]
        target: Target,
        /// Inventory group to select (repeatable)
        #[arg(short, long = "group", required = true)]
        groups: Vec<String>,
        /// New CPU count
        #[arg(long)]
        cpu: u32,
        /// Memory tier
        #[arg(long)]
        mem: Option<String>,
        /// Resize one instance at a time
        #[arg(long)]
        sequential: bool,
        /// Seconds to wait between instances in sequential mode
        #[arg(long, default_value_t = 5)]
        pause: u64,
        /// Instance type table (JSON/YAML file or inline JSON)
        #[arg(long)]
        defaults: String,
    },
    /// Show version information
    Version,
}

fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));
    // stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);
    let max_concurrency = cli.max_concurrency;

    match cli.command {
        Commands::Gather { target } => {
            let fleet = backends::load_fleet(&target.deployment_id, max_concurrency)?;
            commands::gather::handle(&fleet).await?;
        }
        Commands::Create {
            target,
            deployment,
            defaults,
            preserve,
        } => {
            let fleet = backends::load_fleet(&target.deployment_id, max_concurrency)?;
            commands::create::handle(&fleet, &deployment, &defaults, preserve).await?;
        }
        Commands::ToBeDeleted { target, deployment } => {
            let fleet = backends::load_fleet(&target.deployment_id, max_concurrency)?;
            commands::to_be_deleted::handle(&fleet, &deployment).await?;
        }
        Commands::Destroy { target } => {
            let fleet = backends::load_fleet(&target.deployment_id, max_concurrency)?;
            commands::destroy::handle(&fleet).await?;
        }
        Commands::Modify {
            target,
            groups,
            cpu,
            mem,
            sequential,
            pause,
            defaults,
        } => {
            let fleet = backends::load_fleet(&target.deployment_id, max_concurrency)?;
            let args = commands::modify::ModifyArgs {
                groups,
                cpu,
                mem,
                sequential,
                pause,
            };
            commands::modify::handle(&fleet, args, &defaults).await?;
        }
        Commands::Version => {
            println!("vmfleet {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
