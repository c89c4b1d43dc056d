//! `fleetup deploy|pull|build|restart`: drive phases across the fleet.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use fleetup_core::{FleetConfig, HostSet};
use fleetup_deploy::{
    DeployOptions, DeployReport, DeploySummary, HostOutcome, HostState, Orchestrator, Pipeline,
    DEFAULT_MAX_IN_FLIGHT,
};
use fleetup_remote::{
    shutdown_channel, DryRunRunner, PlannedCommand, RemoteRunner, SshRunner,
    DEFAULT_COMMAND_TIMEOUT,
};

/// Arguments shared by every phase-running subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Branch to check out.
    #[arg(long, short = 'b')]
    pub branch: Option<String>,

    /// Repository path on the remote hosts (overrides the inventory).
    #[arg(long, value_name = "PATH")]
    pub repo: Option<PathBuf>,

    /// Restrict the run to these hosts (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "HOST")]
    pub hosts: Vec<String>,

    /// Update one host at a time.
    #[arg(long, conflicts_with = "parallel")]
    pub sequential: bool,

    /// Update several hosts at once.
    #[arg(long)]
    pub parallel: bool,

    /// Upper bound on hosts updated at once; 0 means the whole fleet.
    #[arg(long, default_value_t = DEFAULT_MAX_IN_FLIGHT, value_name = "N")]
    pub max_in_flight: usize,

    /// Per-command timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the commands that would run without connecting anywhere.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn run(self, global: &super::GlobalArgs, pipeline: Pipeline, parallel_default: bool) -> Result<()> {
        let inventory = global.load_inventory()?;
        let config = inventory
            .configure(&global.environment, self.branch.as_deref(), self.repo.as_deref())
            .with_context(|| format!("invalid configuration for environment '{}'", global.environment))?;
        let hosts = if self.hosts.is_empty() {
            config.hosts.clone()
        } else {
            config.hosts.filter_hosts(&self.hosts).context("invalid --hosts")?
        };

        let parallel = if self.sequential {
            false
        } else {
            self.parallel || parallel_default
        };
        let options = if parallel {
            DeployOptions::parallel(pipeline, self.max_in_flight)
        } else {
            DeployOptions::sequential(pipeline)
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        runtime.block_on(self.execute(&config, &hosts, &options))
    }

    async fn execute(&self, config: &FleetConfig, hosts: &HostSet, options: &DeployOptions) -> Result<()> {
        let dry_run = Arc::new(DryRunRunner::new());
        let runner: Arc<dyn RemoteRunner> = if self.dry_run {
            dry_run.clone()
        } else {
            let timeout = self
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT);
            Arc::new(SshRunner::new(config.ssh.clone()).with_timeout(timeout))
        };

        let (handle, shutdown) = shutdown_channel();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; letting in-flight commands finish");
                handle.trigger();
            }
        });

        let report = Orchestrator::new(config, runner)
            .with_shutdown(shutdown)
            .deploy(hosts, options)
            .await;
        let planned = if self.dry_run { dry_run.planned() } else { Vec::new() };

        if self.json {
            print_json(&report, planned)?;
        } else {
            if self.dry_run {
                print_plan(hosts, &planned);
            }
            print_table(&report, self.dry_run);
        }

        if !report.is_success() {
            bail!(
                "{} of {} hosts failed",
                report.failure_count(),
                report.outcomes.len()
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RunJson {
    #[serde(flatten)]
    summary: DeploySummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    planned: Vec<PlannedCommand>,
}

#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "host")]
    host: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "phase")]
    phase: String,
    #[tabled(rename = "detail")]
    detail: String,
    #[tabled(rename = "time")]
    time: String,
}

fn print_json(report: &DeployReport, planned: Vec<PlannedCommand>) -> Result<()> {
    let payload = RunJson {
        summary: report.summary(),
        planned,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize deploy report JSON")?
    );
    Ok(())
}

fn print_plan(hosts: &HostSet, planned: &[PlannedCommand]) {
    for target in hosts {
        println!("{}", format!("[dry-run] {}", target.destination()).bold());
        for step in planned.iter().filter(|p| p.host == target.host.as_str()) {
            println!("  $ {}", step.command);
        }
    }
}

fn print_table(report: &DeployReport, dry_run: bool) {
    let phases: Vec<_> = report.phases.iter().map(|p| p.as_str()).collect();
    let elapsed = report.finished_at - report.started_at;
    println!(
        "{}fleetup v{} | {} | {} | {} | {} ok, {} failed | {:.1}s",
        if dry_run { "[dry-run] " } else { "" },
        env!("CARGO_PKG_VERSION"),
        report.environment,
        report
            .started_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S"),
        phases.join(" → "),
        report.success_count(),
        report.failure_count(),
        elapsed.num_milliseconds() as f64 / 1000.0,
    );

    if report.outcomes.is_empty() {
        println!("No hosts selected.");
        return;
    }

    let rows: Vec<HostRow> = report.outcomes.iter().map(host_row).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn host_row(outcome: &HostOutcome) -> HostRow {
    let (phase, detail) = match &outcome.failure {
        Some(failure) => (failure.phase.to_string(), first_line(&failure.error.to_string())),
        None => {
            let tolerated: Vec<_> = outcome.tolerated().map(|t| t.step.as_str()).collect();
            let detail = if tolerated.is_empty() {
                "ok".to_string()
            } else {
                format!("tolerated: {}", tolerated.join(", "))
            };
            ("-".to_string(), detail)
        }
    };
    HostRow {
        host: outcome.target.host.to_string(),
        state: state_label(&outcome.state),
        phase,
        detail,
        time: format!("{:.1}s", outcome.duration_ms as f64 / 1000.0),
    }
}

fn state_label(state: &HostState) -> String {
    match state {
        HostState::Done => "DONE".green().bold().to_string(),
        HostState::Failed(_) => "FAILED".red().bold().to_string(),
        other => other.to_string().to_uppercase().yellow().to_string(),
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().to_string()
}
