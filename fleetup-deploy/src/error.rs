//! Error types for fleetup-deploy.

use thiserror::Error;

use fleetup_core::ConfigError;
use fleetup_remote::RemoteError;

use crate::phase::Phase;

/// Why a phase could not complete on a host.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The target was not fully configured; nothing ran.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A required remote command failed, timed out, or never reached the host.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl DeployError {
    /// Short machine-readable category for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            DeployError::Config(_) => "configuration",
            DeployError::Remote(err) => err.kind(),
        }
    }
}

/// The phase a host stopped in, and why.
#[derive(Debug, Error)]
#[error("{phase} failed: {error}")]
pub struct PhaseFailure {
    pub phase: Phase,
    #[source]
    pub error: DeployError,
}
