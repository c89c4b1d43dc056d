//! Fleet-wide fan-out of a [`Pipeline`].

use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};

use fleetup_core::{DeploymentTarget, FleetConfig, HostSet};
use fleetup_remote::{RemoteRunner, RemoteSession, Shutdown};

use crate::error::DeployError;
use crate::phase;
use crate::pipeline::Pipeline;
use crate::report::{DeployReport, PhaseReport};

/// Hosts updated at once unless the operator says otherwise.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 6;

/// How a `deploy` call spreads work across hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    pub pipeline: Pipeline,
    /// `false` runs hosts strictly one after another.
    pub parallel: bool,
    /// Cap on concurrently running hosts; `0` means the whole fleet.
    pub max_in_flight: usize,
}

impl DeployOptions {
    pub fn sequential(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            parallel: false,
            max_in_flight: 1,
        }
    }

    pub fn parallel(pipeline: Pipeline, max_in_flight: usize) -> Self {
        Self {
            pipeline,
            parallel: true,
            max_in_flight,
        }
    }

    /// Effective number of concurrent host flows for a fleet of `hosts`.
    pub fn concurrency(&self, hosts: usize) -> usize {
        let hosts = hosts.max(1);
        if !self.parallel {
            1
        } else if self.max_in_flight == 0 {
            hosts
        } else {
            self.max_in_flight.min(hosts)
        }
    }
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self::parallel(Pipeline::full(), DEFAULT_MAX_IN_FLIGHT)
    }
}

/// Runs phases against the fleet described by one [`FleetConfig`].
pub struct Orchestrator<'a> {
    config: &'a FleetConfig,
    runner: Arc<dyn RemoteRunner>,
    shutdown: Shutdown,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a FleetConfig, runner: Arc<dyn RemoteRunner>) -> Self {
        Self {
            config,
            runner,
            shutdown: Shutdown::never(),
        }
    }

    /// Stop starting new commands once `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &FleetConfig {
        self.config
    }

    /// Open a session for one host flow.
    pub fn session(&self, target: &DeploymentTarget) -> RemoteSession {
        RemoteSession::open(self.runner.clone(), target.clone(), self.shutdown.clone())
    }

    pub async fn pull(&self, target: &DeploymentTarget) -> Result<PhaseReport, DeployError> {
        phase::pull(&self.session(target), self.config).await
    }

    pub async fn build(&self, target: &DeploymentTarget) -> Result<PhaseReport, DeployError> {
        phase::build(&self.session(target), self.config).await
    }

    pub async fn restart(&self, target: &DeploymentTarget) -> Result<PhaseReport, DeployError> {
        phase::restart(&self.session(target), self.config).await
    }

    /// Run `options.pipeline` on every host of `hosts`.
    ///
    /// Within a host the phases are strictly ordered; across hosts up to
    /// `options.concurrency()` flows run at once. A failing host never
    /// stops the others. Every host appears in the report, in set order.
    pub async fn deploy(&self, hosts: &HostSet, options: &DeployOptions) -> DeployReport {
        let limit = options.concurrency(hosts.len());
        let started_at = Utc::now();
        tracing::info!(
            environment = %self.config.environment,
            hosts = hosts.len(),
            concurrency = limit,
            runner = self.runner.name(),
            phases = ?options.pipeline.phases(),
            "deploy started",
        );

        // Completion order frees slots; the index restores inventory order.
        let mut outcomes = stream::iter(hosts.iter().enumerate())
            .map(|(index, target)| async move {
                let session = self.session(target);
                (index, options.pipeline.run_host(&session, self.config).await)
            })
            .buffer_unordered(limit)
            .collect::<Vec<_>>()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);
        let outcomes = outcomes.into_iter().map(|(_, outcome)| outcome).collect();

        let report = DeployReport {
            environment: self.config.environment.clone(),
            phases: options.pipeline.phases().to_vec(),
            parallel: options.parallel,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        tracing::info!(
            succeeded = report.success_count(),
            failed = report.failure_count(),
            "deploy finished",
        );
        report
    }
}
