//! fleetup: pull, build and restart a service across an SSH fleet.
//!
//! # Usage
//!
//! ```text
//! fleetup [--inventory PATH] [--env NAME] [-v] deploy [--branch B] [--hosts a,b] [--dry-run] [--json]
//! fleetup pull|build|restart [same options]
//! fleetup inventory init [--force]
//! fleetup inventory show [--json]
//! fleetup inventory check
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{inventory::InventoryCommand, run::RunArgs, GlobalArgs};
use fleetup_deploy::{Phase, Pipeline};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "fleetup",
    version,
    about = "Deploy a service to every host of a fleet over SSH",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pull, build and restart on every host (parallel by default).
    Deploy(RunArgs),

    /// Fetch and check out the branch on every host.
    Pull(RunArgs),

    /// Run the build commands in the repository on every host.
    Build(RunArgs),

    /// Reload the supervisor and restart the program on every host.
    Restart(RunArgs),

    /// Create, inspect or validate the inventory file.
    Inventory {
        #[command(subcommand)]
        command: InventoryCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match cli.command {
        Commands::Deploy(args) => args.run(&cli.global, Pipeline::full(), true),
        Commands::Pull(args) => args.run(&cli.global, Pipeline::only(Phase::Pull), false),
        Commands::Build(args) => args.run(&cli.global, Pipeline::only(Phase::Build), false),
        Commands::Restart(args) => args.run(&cli.global, Pipeline::only(Phase::Restart), false),
        Commands::Inventory { command } => commands::inventory::run(command, &cli.global),
    }
}

/// Logs go to stderr so `--json` output stays machine-readable.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let fallback = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
