//! Domain types for the fleetup inventory.
//!
//! Everything here is plain data: built once at startup, never mutated
//! during a run, and serializable via serde + serde_yaml.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Branch checked out when the operator does not name one.
pub const DEFAULT_BRANCH: &str = "master";

/// Environment selected when the operator does not name one.
pub const DEFAULT_ENVIRONMENT: &str = "production";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Network address (hostname or IP) of a fleet member.
    HostAddress
);
string_newtype!(
    /// Login used for the remote session.
    RemoteUser
);
string_newtype!(
    /// Version-control branch deployed to the fleet.
    BranchName
);
string_newtype!(
    /// Name of an inventory environment (`production`, `staging`, ...).
    EnvironmentName
);

// ---------------------------------------------------------------------------
// Inventory entries
// ---------------------------------------------------------------------------

/// One host as listed in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    pub address: HostAddress,
    pub user: RemoteUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl HostSpec {
    pub fn new(user: impl Into<RemoteUser>, address: impl Into<HostAddress>) -> Self {
        Self {
            address: address.into(),
            user: user.into(),
            port: None,
        }
    }

    /// `user@address`, the form handed to the transport.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }
}

impl fmt::Display for HostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.destination())
    }
}

/// Settings for the remote build step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Environment variable pointing the toolchain at its workspace root.
    pub env_var: String,
    pub workspace_root: PathBuf,
    /// Run in order inside the repository; the first is dependency fetch.
    pub commands: Vec<String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            env_var: "GOPATH".to_string(),
            workspace_root: PathBuf::from("/opt/WWWRoot/"),
            commands: vec!["go get".to_string(), "go build".to_string()],
        }
    }
}

/// Process supervisor control settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Control binary on the remote host.
    pub ctl: String,
    /// Managed program restarted after a build.
    pub program: String,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            ctl: "supervisorctl".to_string(),
            program: "go_language_detect".to_string(),
        }
    }
}

/// Transport settings shared by every host of an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// Client binary; replaceable by a wrapper script.
    pub program: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    /// Extra `-o` options, e.g. `StrictHostKeyChecking=accept-new`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            identity_file: None,
            connect_timeout_secs: 10,
            options: Vec::new(),
        }
    }
}

/// A named group of hosts sharing one repository layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: EnvironmentName,
    #[serde(default)]
    pub hosts: Vec<HostSpec>,
    /// Default repository checkout on every host.
    pub repo_path: PathBuf,
    #[serde(default)]
    pub build: BuildSettings,
    #[serde(default)]
    pub supervisor: SupervisorSettings,
    #[serde(default)]
    pub ssh: SshSettings,
}

/// Root of the inventory YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub version: u32,
    #[serde(default)]
    pub environments: Vec<Environment>,
}

impl Inventory {
    pub const CURRENT_VERSION: u32 = 1;

    /// The six-host production fleet used when no inventory file exists.
    pub fn builtin() -> Self {
        let hosts = (1..=6)
            .map(|n| HostSpec::new("user", format!("daria{n:02}")))
            .collect();
        Self {
            version: Self::CURRENT_VERSION,
            environments: vec![Environment {
                name: EnvironmentName::from(DEFAULT_ENVIRONMENT),
                hosts,
                repo_path: PathBuf::from("/opt/WWWRoot/go_language_detect/"),
                build: BuildSettings::default(),
                supervisor: SupervisorSettings::default(),
                ssh: SshSettings::default(),
            }],
        }
    }

    pub fn environment(&self, name: &str) -> Result<&Environment, ConfigError> {
        self.environments
            .iter()
            .find(|env| env.name.0 == name)
            .ok_or_else(|| ConfigError::UnknownEnvironment {
                name: name.to_string(),
                known: self.environments.iter().map(|e| e.name.0.clone()).collect(),
            })
    }
}

// ---------------------------------------------------------------------------
// Run-time configuration
// ---------------------------------------------------------------------------

/// Everything one remote operation needs to know about its host.
///
/// `Default` yields an unconfigured target, which every operation rejects.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeploymentTarget {
    pub host: HostAddress,
    pub user: RemoteUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub repo_path: PathBuf,
    pub branch: BranchName,
}

impl DeploymentTarget {
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Fails on the first empty field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = if self.host.is_empty() {
            Some("host")
        } else if self.user.is_empty() {
            Some("user")
        } else if self.repo_path.as_os_str().is_empty() {
            Some("repo_path")
        } else if self.branch.is_empty() {
            Some("branch")
        } else {
            None
        };
        match missing {
            Some(field) => Err(ConfigError::IncompleteTarget {
                host: self.host.0.clone(),
                field,
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.host.fmt(f)
    }
}

/// Ordered list of deployment targets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostSet {
    pub targets: Vec<DeploymentTarget>,
}

impl HostSet {
    pub fn new(targets: Vec<DeploymentTarget>) -> Self {
        Self { targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeploymentTarget> {
        self.targets.iter()
    }

    /// Restrict the set to the named hosts, keeping inventory order.
    pub fn filter_hosts(&self, names: &[String]) -> Result<HostSet, ConfigError> {
        if let Some(unknown) = names
            .iter()
            .find(|name| !self.targets.iter().any(|t| t.host.0 == **name))
        {
            return Err(ConfigError::UnknownHost {
                host: unknown.clone(),
            });
        }
        Ok(HostSet::new(
            self.targets
                .iter()
                .filter(|t| names.iter().any(|n| *n == t.host.0))
                .cloned()
                .collect(),
        ))
    }
}

impl<'a> IntoIterator for &'a HostSet {
    type Item = &'a DeploymentTarget;
    type IntoIter = std::slice::Iter<'a, DeploymentTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

/// Immutable configuration for one run, passed by reference everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetConfig {
    pub environment: EnvironmentName,
    pub hosts: HostSet,
    pub build: BuildSettings,
    pub supervisor: SupervisorSettings,
    pub ssh: SshSettings,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
