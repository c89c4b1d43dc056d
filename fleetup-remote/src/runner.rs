//! The seam between orchestration and the transport.

use std::sync::Mutex;

use async_trait::async_trait;
use fleetup_core::DeploymentTarget;
use serde::Serialize;

use crate::command::{CommandOutput, RemoteCommand};
use crate::error::RemoteError;

/// Executes one command on one host.
///
/// Implementations return `Ok` for every remote process that ran to
/// completion, whatever its exit code; `Err` is reserved for transport
/// failures, timeouts, and local spawn errors.
#[async_trait]
pub trait RemoteRunner: Send + Sync {
    /// Label for logs (`ssh`, `dry-run`, ...).
    fn name(&self) -> &str;

    async fn run(
        &self,
        target: &DeploymentTarget,
        command: &RemoteCommand,
    ) -> Result<CommandOutput, RemoteError>;
}

/// One command a dry run would have sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCommand {
    pub host: String,
    pub command: String,
}

/// Records every command instead of running it; always succeeds.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    planned: Mutex<Vec<PlannedCommand>>,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands seen so far, in submission order.
    pub fn planned(&self) -> Vec<PlannedCommand> {
        self.planned
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RemoteRunner for DryRunRunner {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn run(
        &self,
        target: &DeploymentTarget,
        command: &RemoteCommand,
    ) -> Result<CommandOutput, RemoteError> {
        let rendered = command.render();
        tracing::info!(host = %target.host, command = %rendered, "[dry-run] would run");
        if let Ok(mut planned) = self.planned.lock() {
            planned.push(PlannedCommand {
                host: target.host.0.clone(),
                command: rendered,
            });
        }
        Ok(CommandOutput::default())
    }
}
