//! OpenSSH client transport.
//!
//! Every command gets its own `ssh` process (no connection reuse). The
//! remote command is passed as a single argument so that the remote shell
//! handles `cd`, `&&`, quoting, etc.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fleetup_core::{DeploymentTarget, SshSettings};
use tokio::process::Command;

use crate::command::{CommandOutput, RemoteCommand};
use crate::error::RemoteError;
use crate::runner::RemoteRunner;

/// Upper bound for a single remote command (a cold `go get` can be slow).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// OpenSSH reserves 255 for its own failures (resolve, connect, auth).
const SSH_TRANSPORT_EXIT: i32 = 255;

/// Runs commands through the OpenSSH client binary.
#[derive(Debug, Clone)]
pub struct SshRunner {
    settings: SshSettings,
    timeout: Duration,
}

impl SshRunner {
    pub fn new(settings: SshSettings) -> Self {
        Self {
            settings,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Argument vector for `settings.program`; the rendered command is last.
    pub fn build_args(&self, target: &DeploymentTarget, command: &RemoteCommand) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.settings.connect_timeout_secs),
        ];
        if let Some(port) = target.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(key) = &self.settings.identity_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        for option in &self.settings.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args.push(target.destination());
        args.push("--".to_string());
        args.push(command.render());
        args
    }
}

#[async_trait]
impl RemoteRunner for SshRunner {
    fn name(&self) -> &str {
        "ssh"
    }

    async fn run(
        &self,
        target: &DeploymentTarget,
        command: &RemoteCommand,
    ) -> Result<CommandOutput, RemoteError> {
        let host = target.host.0.clone();
        let rendered = command.render();
        let args = self.build_args(target, command);

        tracing::debug!(
            host = %host,
            program = %self.settings.program,
            command = %rendered,
            "spawning remote command",
        );

        let mut cmd = Command::new(&self.settings.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group: a terminal ctrl-c must reach only fleetup, which
        // then stops at the next command boundary.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|err| RemoteError::Transport {
                host: host.clone(),
                message: format!("failed to start {}: {err}", self.settings.program),
            })?;

        let started = Instant::now();
        // On timeout the future is dropped, which kills the child.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(RemoteError::Transport {
                    host,
                    message: format!("lost {} process: {err}", self.settings.program),
                })
            }
            Err(_) => {
                tracing::warn!(host = %host, command = %rendered, "remote command timed out");
                return Err(RemoteError::Timeout {
                    host,
                    command: rendered,
                    after: self.timeout,
                });
            }
        };

        let Some(exit_code) = output.status.code() else {
            return Err(RemoteError::Transport {
                host,
                message: format!("{} was terminated by a signal", self.settings.program),
            });
        };
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        tracing::debug!(
            host = %host,
            exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "remote command exited",
        );

        if exit_code == SSH_TRANSPORT_EXIT {
            let message = stderr.trim();
            return Err(RemoteError::Transport {
                host,
                message: if message.is_empty() {
                    format!("{} exited with status 255", self.settings.program)
                } else {
                    message.to_string()
                },
            });
        }

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}
