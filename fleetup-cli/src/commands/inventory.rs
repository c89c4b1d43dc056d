//! `fleetup inventory`: create, print and validate the inventory file.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use fleetup_core::{inventory, Environment, Inventory};

use super::GlobalArgs;

#[derive(Subcommand, Debug)]
pub enum InventoryCommand {
    /// Write the built-in fleet to the inventory path.
    Init {
        /// Overwrite an existing inventory.
        #[arg(long)]
        force: bool,
    },
    /// Print every environment and its hosts.
    Show {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
    /// Validate the inventory and every environment in it.
    Check,
}

pub fn run(command: InventoryCommand, global: &GlobalArgs) -> Result<()> {
    match command {
        InventoryCommand::Init { force } => init(global, force),
        InventoryCommand::Show { json } => show(global, json),
        InventoryCommand::Check => check(global),
    }
}

fn init(global: &GlobalArgs, force: bool) -> Result<()> {
    let path = global.inventory_path()?;
    let existed = path.exists();
    let inventory = inventory::init_at(&path, force)
        .with_context(|| format!("failed to write inventory '{}'", path.display()))?;

    if existed && !force {
        println!("Inventory already exists: {}", path.display());
        println!("  Use --force to overwrite it with the built-in fleet.");
        return Ok(());
    }
    let hosts: usize = inventory.environments.iter().map(|e| e.hosts.len()).sum();
    println!(
        "✓ Wrote {} environment(s), {} host(s) to {}",
        inventory.environments.len(),
        hosts,
        path.display()
    );
    Ok(())
}

#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "host")]
    host: String,
    #[tabled(rename = "user")]
    user: String,
    #[tabled(rename = "port")]
    port: String,
}

fn show(global: &GlobalArgs, json: bool) -> Result<()> {
    let inventory = global.load_inventory()?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&inventory).context("failed to serialize inventory JSON")?
        );
        return Ok(());
    }

    for env in &inventory.environments {
        print_environment(env);
    }
    Ok(())
}

fn print_environment(env: &Environment) {
    println!("{}", env.name.as_str().to_uppercase().bold());
    println!("  repo:       {}", env.repo_path.display());
    println!(
        "  build:      {}={} {}",
        env.build.env_var,
        env.build.workspace_root.display(),
        env.build.commands.join(" && ")
    );
    println!("  supervisor: {} {}", env.supervisor.ctl, env.supervisor.program);

    let rows: Vec<HostRow> = env
        .hosts
        .iter()
        .map(|h| HostRow {
            host: h.address.to_string(),
            user: h.user.to_string(),
            port: h.port.map_or_else(|| "22".to_string(), |p| p.to_string()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn check(global: &GlobalArgs) -> Result<()> {
    let inventory: Inventory = global.load_inventory()?;
    let mut failed = 0;
    for env in &inventory.environments {
        match fleetup_core::configure(env, None, None) {
            Ok(config) => println!(
                "{} {} ({} host(s))",
                "✓".green().bold(),
                env.name,
                config.hosts.len()
            ),
            Err(err) => {
                failed += 1;
                println!("{} {}: {err}", "✗".red().bold(), env.name);
            }
        }
    }

    // The selected environment must exist even when every listed one is fine.
    inventory
        .environment(&global.environment)
        .with_context(|| format!("environment '{}' is not defined", global.environment))?;

    if failed > 0 {
        bail!("{failed} environment(s) failed validation");
    }
    Ok(())
}
