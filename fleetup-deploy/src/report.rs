//! Per-host outcomes and the fleet-wide aggregate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use fleetup_core::{DeploymentTarget, EnvironmentName};

use crate::error::PhaseFailure;
use crate::phase::Phase;

/// A best-effort step that failed without failing its phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToleratedFailure {
    pub step: String,
    pub command: String,
    pub exit_code: i32,
    pub message: String,
}

/// A phase that completed on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tolerated: Vec<ToleratedFailure>,
}

/// Where a host is in its `pull → build → restart` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "phase")]
pub enum HostState {
    Pending,
    Pulling,
    Building,
    Restarting,
    Done,
    Failed(Phase),
}

impl HostState {
    /// State while `phase` is executing.
    pub fn running(phase: Phase) -> Self {
        match phase {
            Phase::Pull => HostState::Pulling,
            Phase::Build => HostState::Building,
            Phase::Restart => HostState::Restarting,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, HostState::Done | HostState::Failed(_))
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostState::Pending => f.write_str("pending"),
            HostState::Pulling => f.write_str("pulling"),
            HostState::Building => f.write_str("building"),
            HostState::Restarting => f.write_str("restarting"),
            HostState::Done => f.write_str("done"),
            HostState::Failed(phase) => write!(f, "failed ({phase})"),
        }
    }
}

/// Final result for one host.
#[derive(Debug)]
pub struct HostOutcome {
    pub target: DeploymentTarget,
    pub state: HostState,
    pub completed: Vec<PhaseReport>,
    pub failure: Option<PhaseFailure>,
    pub duration_ms: u64,
}

impl HostOutcome {
    pub fn is_success(&self) -> bool {
        self.state == HostState::Done
    }

    /// Best-effort failures across all completed phases.
    pub fn tolerated(&self) -> impl Iterator<Item = &ToleratedFailure> {
        self.completed.iter().flat_map(|p| p.tolerated.iter())
    }
}

/// Aggregate result of one `deploy` call.
///
/// Outcomes are listed in host-set order regardless of completion order.
#[derive(Debug)]
pub struct DeployReport {
    pub environment: EnvironmentName,
    pub phases: Vec<Phase>,
    pub parallel: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<HostOutcome>,
}

impl DeployReport {
    pub fn successes(&self) -> impl Iterator<Item = &HostOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &HostOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// True only if every host finished every requested phase.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(HostOutcome::is_success)
    }

    /// Flattened, serializable view for `--json` output.
    pub fn summary(&self) -> DeploySummary {
        DeploySummary {
            environment: self.environment.to_string(),
            phases: self.phases.clone(),
            parallel: self.parallel,
            started_at: self.started_at,
            finished_at: self.finished_at,
            succeeded: self.success_count(),
            failed: self.failure_count(),
            hosts: self.outcomes.iter().map(HostSummary::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploySummary {
    pub environment: String,
    pub phases: Vec<Phase>,
    pub parallel: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: usize,
    pub failed: usize,
    pub hosts: Vec<HostSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostSummary {
    pub host: String,
    pub state: HostState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tolerated: Vec<ToleratedFailure>,
}

impl From<&HostOutcome> for HostSummary {
    fn from(outcome: &HostOutcome) -> Self {
        let failure = outcome.failure.as_ref();
        Self {
            host: outcome.target.host.to_string(),
            state: outcome.state,
            failed_phase: failure.map(|f| f.phase),
            error_kind: failure.map(|f| f.error.kind()),
            message: failure.map(|f| f.error.to_string()),
            duration_ms: outcome.duration_ms,
            tolerated: outcome.tolerated().cloned().collect(),
        }
    }
}
