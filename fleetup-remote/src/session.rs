//! Per-host remote session and the shutdown signal checked between commands.

use std::sync::Arc;
use std::time::Instant;

use fleetup_core::DeploymentTarget;
use tokio::sync::watch;

use crate::command::{CommandOutput, RemoteCommand};
use crate::error::RemoteError;
use crate::runner::RemoteRunner;

/// Receiving side of the run-wide shutdown flag.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Sending side; triggering is idempotent.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Create a linked handle/signal pair.
pub fn shutdown_channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Shutdown {
    /// A signal that is never triggered.
    pub fn never() -> Self {
        shutdown_channel().1
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

/// A transient session with one host.
///
/// Commands run one at a time; a triggered shutdown is honored before the
/// next command starts, never in the middle of one.
pub struct RemoteSession {
    runner: Arc<dyn RemoteRunner>,
    target: DeploymentTarget,
    shutdown: Shutdown,
}

impl RemoteSession {
    pub fn open(runner: Arc<dyn RemoteRunner>, target: DeploymentTarget, shutdown: Shutdown) -> Self {
        Self {
            runner,
            target,
            shutdown,
        }
    }

    pub fn target(&self) -> &DeploymentTarget {
        &self.target
    }

    /// Run `command`; a non-zero exit becomes [`RemoteError::Execution`].
    pub async fn exec(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteError> {
        let output = self.exec_tolerant(command).await?;
        if output.success() {
            return Ok(output);
        }
        Err(RemoteError::Execution {
            host: self.target.host.0.clone(),
            command: command.render(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Run `command` and hand back its output whatever the exit code.
    ///
    /// Transport errors, timeouts, and cancellation are still errors.
    pub async fn exec_tolerant(
        &self,
        command: &RemoteCommand,
    ) -> Result<CommandOutput, RemoteError> {
        if self.shutdown.is_triggered() {
            return Err(RemoteError::Cancelled {
                host: self.target.host.0.clone(),
            });
        }

        let started = Instant::now();
        let output = self.runner.run(&self.target, command).await?;
        tracing::debug!(
            host = %self.target.host,
            runner = self.runner.name(),
            exit_code = output.exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            command = %command,
            "command finished",
        );
        Ok(output)
    }
}
