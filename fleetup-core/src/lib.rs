//! fleetup core library: inventory types, persistence, run configuration.
//!
//! - [`types`]: newtypes, inventory entries, [`FleetConfig`]
//! - [`error`]: [`ConfigError`]
//! - [`inventory`]: load / save / init of the inventory YAML
//! - [`configure`]: environment + branch + path → [`FleetConfig`]

pub mod configure;
pub mod error;
pub mod inventory;
pub mod types;

pub use configure::configure;
pub use error::ConfigError;
pub use types::{
    BranchName, BuildSettings, DeploymentTarget, Environment, EnvironmentName, FleetConfig,
    HostAddress, HostSet, HostSpec, Inventory, RemoteUser, SshSettings, SupervisorSettings,
    DEFAULT_BRANCH, DEFAULT_ENVIRONMENT,
};
