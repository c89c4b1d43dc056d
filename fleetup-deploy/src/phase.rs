//! The three deployment phases and the remote steps each one runs.
//!
//! A phase is data: [`Phase::steps`] lists its commands, and
//! [`run_phase`] executes them in order on one session.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use fleetup_core::{DeploymentTarget, FleetConfig};
use fleetup_remote::{shell_escape, RemoteCommand, RemoteSession};

use crate::error::DeployError;
use crate::report::{PhaseReport, ToleratedFailure};

/// One discrete remote operation group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pull,
    Build,
    Restart,
}

impl Phase {
    /// Deployment order.
    pub const ALL: [Phase; 3] = [Phase::Pull, Phase::Build, Phase::Restart];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pull => "pull",
            Phase::Build => "build",
            Phase::Restart => "restart",
        }
    }

    /// Remote steps for this phase on `target`, in execution order.
    pub fn steps(&self, target: &DeploymentTarget, config: &FleetConfig) -> Vec<Step> {
        let repo = &target.repo_path;
        match self {
            Phase::Pull => vec![
                Step::required("fetch", RemoteCommand::new("git fetch -p --quiet").in_dir(repo)),
                Step::required(
                    "checkout",
                    RemoteCommand::new(format!(
                        "git checkout --quiet {}",
                        shell_escape(target.branch.as_str())
                    ))
                    .in_dir(repo),
                ),
                // Detached HEAD or a branch without upstream makes this fail.
                Step::best_effort("sync", RemoteCommand::new("git pull --quiet").in_dir(repo)),
            ],
            Phase::Build => config
                .build
                .commands
                .iter()
                .map(|line| {
                    Step::required(
                        line.clone(),
                        RemoteCommand::new(line.clone()).in_dir(repo).with_env(
                            config.build.env_var.clone(),
                            config.build.workspace_root.display().to_string(),
                        ),
                    )
                })
                .collect(),
            Phase::Restart => {
                let ctl = &config.supervisor.ctl;
                vec![
                    Step::required("reload", RemoteCommand::new(format!("{ctl} update"))),
                    Step::required(
                        "restart",
                        RemoteCommand::new(format!(
                            "{ctl} restart {}",
                            shell_escape(&config.supervisor.program)
                        )),
                    ),
                ]
            }
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a failing step fails its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    Required,
    /// Non-zero exit is logged and recorded, then the phase continues.
    BestEffort,
}

/// A single remote command within a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub label: String,
    pub command: RemoteCommand,
    pub policy: StepPolicy,
}

impl Step {
    pub fn required(label: impl Into<String>, command: RemoteCommand) -> Self {
        Self {
            label: label.into(),
            command,
            policy: StepPolicy::Required,
        }
    }

    pub fn best_effort(label: impl Into<String>, command: RemoteCommand) -> Self {
        Self {
            label: label.into(),
            command,
            policy: StepPolicy::BestEffort,
        }
    }
}

/// Run every step of `phase` on `session`.
///
/// The target is validated first; an incomplete target fails with
/// [`DeployError::Config`] before any remote command runs.
pub async fn run_phase(
    phase: Phase,
    session: &RemoteSession,
    config: &FleetConfig,
) -> Result<PhaseReport, DeployError> {
    let target = session.target();
    target.validate()?;

    let started = Instant::now();
    let mut tolerated = Vec::new();

    for step in phase.steps(target, config) {
        tracing::debug!(host = %target.host, phase = %phase, step = %step.label, "step started");
        match step.policy {
            StepPolicy::Required => {
                session.exec(&step.command).await?;
            }
            StepPolicy::BestEffort => {
                let output = session.exec_tolerant(&step.command).await?;
                if !output.success() {
                    let message = output
                        .stderr
                        .lines()
                        .chain(output.stdout.lines())
                        .find(|l| !l.trim().is_empty())
                        .unwrap_or("no output")
                        .trim()
                        .to_string();
                    tracing::warn!(
                        host = %target.host,
                        phase = %phase,
                        step = %step.label,
                        exit_code = output.exit_code,
                        message = %message,
                        "best-effort step failed; continuing with possibly stale code",
                    );
                    tolerated.push(ToleratedFailure {
                        step: step.label,
                        command: step.command.render(),
                        exit_code: output.exit_code,
                        message,
                    });
                }
            }
        }
    }

    Ok(PhaseReport {
        phase,
        duration_ms: started.elapsed().as_millis() as u64,
        tolerated,
    })
}

/// Fetch, check out the configured branch, then best-effort pull.
pub async fn pull(session: &RemoteSession, config: &FleetConfig) -> Result<PhaseReport, DeployError> {
    run_phase(Phase::Pull, session, config).await
}

/// Fetch dependencies and compile inside the repository.
pub async fn build(session: &RemoteSession, config: &FleetConfig) -> Result<PhaseReport, DeployError> {
    run_phase(Phase::Build, session, config).await
}

/// Reload the supervisor configuration, then restart the managed program.
pub async fn restart(
    session: &RemoteSession,
    config: &FleetConfig,
) -> Result<PhaseReport, DeployError> {
    run_phase(Phase::Restart, session, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetup_core::{Inventory, DEFAULT_ENVIRONMENT};

    fn config() -> FleetConfig {
        Inventory::builtin()
            .configure(DEFAULT_ENVIRONMENT, Some("release"), None)
            .expect("configure")
    }

    fn rendered(phase: Phase) -> Vec<String> {
        let cfg = config();
        let target = cfg.hosts.targets[0].clone();
        phase
            .steps(&target, &cfg)
            .into_iter()
            .map(|s| s.command.render())
            .collect()
    }

    #[test]
    fn pull_steps_fetch_checkout_then_sync() {
        assert_eq!(
            rendered(Phase::Pull),
            vec![
                "cd '/opt/WWWRoot/go_language_detect/' && git fetch -p --quiet",
                "cd '/opt/WWWRoot/go_language_detect/' && git checkout --quiet 'release'",
                "cd '/opt/WWWRoot/go_language_detect/' && git pull --quiet",
            ]
        );
    }

    #[test]
    fn only_the_sync_step_is_best_effort() {
        let cfg = config();
        let policies: Vec<_> = Phase::Pull
            .steps(&cfg.hosts.targets[0], &cfg)
            .into_iter()
            .map(|s| s.policy)
            .collect();
        assert_eq!(
            policies,
            [StepPolicy::Required, StepPolicy::Required, StepPolicy::BestEffort]
        );
    }

    #[test]
    fn build_steps_export_workspace_root() {
        assert_eq!(
            rendered(Phase::Build),
            vec![
                "cd '/opt/WWWRoot/go_language_detect/' && export GOPATH='/opt/WWWRoot/' && go get",
                "cd '/opt/WWWRoot/go_language_detect/' && export GOPATH='/opt/WWWRoot/' && go build",
            ]
        );
    }

    #[test]
    fn restart_reloads_before_restarting_program() {
        assert_eq!(
            rendered(Phase::Restart),
            vec![
                "supervisorctl update",
                "supervisorctl restart 'go_language_detect'",
            ]
        );
    }

    #[test]
    fn phase_display_and_order() {
        let names: Vec<_> = Phase::ALL.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, ["pull", "build", "restart"]);
    }
}
