pub mod inventory;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args};

use fleetup_core::{inventory as store, Inventory, DEFAULT_ENVIRONMENT};

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Inventory file. Defaults to ~/.fleetup/inventory.yaml, falling back
    /// to the built-in fleet when that file does not exist.
    #[arg(long, global = true, env = "FLEETUP_INVENTORY", value_name = "PATH")]
    pub inventory: Option<PathBuf>,

    /// Inventory environment to operate on.
    #[arg(long = "env", global = true, default_value = DEFAULT_ENVIRONMENT, value_name = "NAME")]
    pub environment: String,

    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

impl GlobalArgs {
    /// Where `inventory init` writes and where loading looks first.
    pub fn inventory_path(&self) -> Result<PathBuf> {
        match &self.inventory {
            Some(path) => Ok(path.clone()),
            None => store::default_inventory_path().context("could not determine home directory"),
        }
    }

    /// An explicit `--inventory` must exist; the default location may not.
    pub fn load_inventory(&self) -> Result<Inventory> {
        let path = self.inventory_path()?;
        let loaded = if self.inventory.is_some() {
            store::load_at(&path)
        } else {
            store::load_or_builtin(&path)
        };
        loaded.with_context(|| format!("failed to load inventory '{}'", path.display()))
    }
}
