//! Remote command model and shell rendering.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// A shell command line plus the working directory and environment it
/// needs on the remote host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteCommand {
    pub line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<(String, String)>,
}

impl RemoteCommand {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Single string for the remote shell:
    /// `cd '<cwd>' && export K='v' && <line>`.
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.env.len() + 2);
        if let Some(cwd) = &self.cwd {
            parts.push(format!("cd {}", shell_escape(&cwd.to_string_lossy())));
        }
        for (key, value) in &self.env {
            parts.push(format!("export {key}={}", shell_escape(value)));
        }
        parts.push(self.line.clone());
        parts.join(" && ")
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Captured result of a remote process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Wrap `s` in single quotes for a POSIX shell.
pub fn shell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
