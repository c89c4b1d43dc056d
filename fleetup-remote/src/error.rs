//! Error types for remote execution.

use std::time::Duration;

use thiserror::Error;

/// Why a remote command did not complete successfully.
///
/// `Transport` means the host was never reached (or the session broke);
/// `Execution` means the host ran the command and it exited non-zero.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("`{command}` exited with status {exit_code} on {host}{}", output_tail(.stdout, .stderr))]
    Execution {
        host: String,
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("cannot reach {host}: {message}")]
    Transport { host: String, message: String },

    #[error("`{command}` timed out on {host} after {}s", .after.as_secs())]
    Timeout {
        host: String,
        command: String,
        after: Duration,
    },

    #[error("cancelled before next command on {host}")]
    Cancelled { host: String },
}

impl RemoteError {
    pub fn host(&self) -> &str {
        match self {
            RemoteError::Execution { host, .. }
            | RemoteError::Transport { host, .. }
            | RemoteError::Timeout { host, .. }
            | RemoteError::Cancelled { host } => host,
        }
    }

    /// Short machine-readable category for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteError::Execution { .. } => "execution",
            RemoteError::Transport { .. } => "transport",
            RemoteError::Timeout { .. } => "timeout",
            RemoteError::Cancelled { .. } => "cancelled",
        }
    }
}

/// Last non-empty line of stderr, else stdout, as `: <line>`.
fn output_tail(stdout: &str, stderr: &str) -> String {
    [stderr, stdout]
        .iter()
        .filter_map(|s| s.lines().rev().find(|l| !l.trim().is_empty()))
        .next()
        .map(|line| format!(": {}", line.trim()))
        .unwrap_or_default()
}
