//! Scripted runner for tests.
//!
//! Records every call and answers from a small rule list, so higher-level
//! orchestration can be exercised without a network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fleetup_core::DeploymentTarget;

use crate::command::{CommandOutput, RemoteCommand};
use crate::error::RemoteError;
use crate::runner::RemoteRunner;

/// A command as the mock saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub host: String,
    pub command: String,
}

#[derive(Debug, Clone)]
enum Reply {
    Exit { code: i32, stderr: String },
    Unreachable(String),
}

#[derive(Debug, Clone)]
struct Rule {
    host: Option<String>,
    needle: String,
    reply: Reply,
}

impl Rule {
    fn matches(&self, host: &str, rendered: &str) -> bool {
        self.host.as_deref().map_or(true, |h| h == host) && rendered.contains(&self.needle)
    }
}

/// Test double: succeeds unless a rule says otherwise.
#[derive(Debug, Default)]
pub struct MockRunner {
    rules: Vec<Rule>,
    delay: Option<Duration>,
    host_delays: Vec<(String, Duration)>,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands on `host` containing `needle` exit with `exit_code`.
    pub fn fail_on(mut self, host: &str, needle: &str, exit_code: i32) -> Self {
        self.rules.push(Rule {
            host: Some(host.to_string()),
            needle: needle.to_string(),
            reply: Reply::Exit {
                code: exit_code,
                stderr: format!("mock: `{needle}` failed"),
            },
        });
        self
    }

    /// Commands on any host containing `needle` exit with `exit_code`.
    pub fn fail_everywhere_on(mut self, needle: &str, exit_code: i32) -> Self {
        self.rules.push(Rule {
            host: None,
            needle: needle.to_string(),
            reply: Reply::Exit {
                code: exit_code,
                stderr: format!("mock: `{needle}` failed"),
            },
        });
        self
    }

    /// Every command on `host` fails at the transport level.
    pub fn unreachable(mut self, host: &str) -> Self {
        self.rules.push(Rule {
            host: Some(host.to_string()),
            needle: String::new(),
            reply: Reply::Unreachable("Connection refused".to_string()),
        });
        self
    }

    /// Hold every command for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold commands on `host` for `delay`, overriding [`Self::with_delay`].
    pub fn with_host_delay(mut self, host: &str, delay: Duration) -> Self {
        self.host_delays.push((host.to_string(), delay));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Rendered commands sent to `host`, in order.
    pub fn commands_for(&self, host: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.host == host)
            .map(|c| c.command)
            .collect()
    }

    /// Highest number of commands that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteRunner for MockRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(
        &self,
        target: &DeploymentTarget,
        command: &RemoteCommand,
    ) -> Result<CommandOutput, RemoteError> {
        let host = target.host.0.clone();
        let rendered = command.render();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                host: host.clone(),
                command: rendered.clone(),
            });
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let delay = self
            .host_delays
            .iter()
            .find(|(h, _)| *h == host)
            .map(|(_, d)| *d)
            .or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.rules.iter().find(|r| r.matches(&host, &rendered)) {
            Some(Rule {
                reply: Reply::Unreachable(message),
                ..
            }) => Err(RemoteError::Transport {
                host,
                message: message.clone(),
            }),
            Some(Rule {
                reply: Reply::Exit { code, stderr },
                ..
            }) => Ok(CommandOutput {
                exit_code: *code,
                stdout: String::new(),
                stderr: stderr.clone(),
            }),
            None => Ok(CommandOutput::default()),
        }
    }
}
