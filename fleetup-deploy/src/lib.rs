//! # fleetup-deploy
//!
//! Phases, the per-host pipeline, and the fleet orchestrator.
//!
//! Build a [`FleetConfig`](fleetup_core::FleetConfig) with
//! `fleetup_core::configure`, pick a runner, then call
//! [`Orchestrator::deploy`].

pub mod error;
pub mod orchestrator;
pub mod phase;
pub mod pipeline;
pub mod report;

pub use error::{DeployError, PhaseFailure};
pub use orchestrator::{DeployOptions, Orchestrator, DEFAULT_MAX_IN_FLIGHT};
pub use phase::{build, pull, restart, run_phase, Phase, Step, StepPolicy};
pub use pipeline::Pipeline;
pub use report::{
    DeployReport, DeploySummary, HostOutcome, HostState, HostSummary, PhaseReport,
    ToleratedFailure,
};
