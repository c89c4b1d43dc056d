//! Ordered phase list shared by `deploy` and the single-phase commands.

use std::time::Instant;

use fleetup_core::FleetConfig;
use fleetup_remote::RemoteSession;

use crate::error::PhaseFailure;
use crate::phase::{run_phase, Phase};
use crate::report::{HostOutcome, HostState};

/// Phases to run on each host, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    phases: Vec<Phase>,
}

impl Pipeline {
    pub fn new(phases: Vec<Phase>) -> Self {
        Self { phases }
    }

    /// `pull → build → restart`.
    pub fn full() -> Self {
        Self::new(Phase::ALL.to_vec())
    }

    /// A single phase, for manual partial runs.
    pub fn only(phase: Phase) -> Self {
        Self::new(vec![phase])
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Drive one host through every phase.
    ///
    /// Stops at the first failing phase; later phases never start.
    pub async fn run_host(&self, session: &RemoteSession, config: &FleetConfig) -> HostOutcome {
        let started = Instant::now();
        let target = session.target().clone();
        let mut completed = Vec::with_capacity(self.phases.len());

        for &phase in &self.phases {
            tracing::info!(host = %target.host, state = %HostState::running(phase), "phase started");
            match run_phase(phase, session, config).await {
                Ok(report) => completed.push(report),
                Err(error) => {
                    tracing::error!(host = %target.host, phase = %phase, error = %error, "phase failed");
                    return HostOutcome {
                        target,
                        state: HostState::Failed(phase),
                        completed,
                        failure: Some(PhaseFailure { phase, error }),
                        duration_ms: started.elapsed().as_millis() as u64,
                    };
                }
            }
        }

        tracing::info!(host = %target.host, state = %HostState::Done, "host finished");
        HostOutcome {
            target,
            state: HostState::Done,
            completed,
            failure: None,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::full()
    }
}
