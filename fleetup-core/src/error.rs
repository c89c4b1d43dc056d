//! Error types for fleetup-core.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can be wrong with the inventory or a run's configuration.
///
/// All of these are detected before any remote command runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, read-only filesystem, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse inventory at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or pass --inventory")]
    HomeNotFound,

    #[error("inventory not found at {path}")]
    InventoryNotFound { path: PathBuf },

    #[error("unsupported inventory version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("environment '{name}' is defined more than once")]
    DuplicateEnvironment { name: String },

    #[error("unknown environment '{name}'; known: {}", known.join(", "))]
    UnknownEnvironment { name: String, known: Vec<String> },

    #[error("host '{host}' is not part of the selected environment")]
    UnknownHost { host: String },

    #[error("environment '{environment}' has no hosts")]
    EmptyHostList { environment: String },

    #[error("branch name must not be empty")]
    EmptyBranch,

    #[error("repository path must not be empty")]
    EmptyRepoPath,

    /// A target reached an operation without host, user, path, or branch.
    #[error("deployment target '{host}' is not configured: missing {field}")]
    IncompleteTarget { host: String, field: &'static str },

    #[error("invalid host entry in environment '{environment}': {reason}")]
    InvalidHost { environment: String, reason: String },
}
