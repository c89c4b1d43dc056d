use std::sync::Arc;
use std::time::Duration;

use fleetup_core::{DeploymentTarget, FleetConfig, HostSet, Inventory, DEFAULT_ENVIRONMENT};
use fleetup_deploy::{DeployError, DeployOptions, HostState, Orchestrator, Phase, Pipeline};
use fleetup_remote::{shutdown_channel, MockRunner, RemoteError};
use rstest::rstest;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fleet() -> FleetConfig {
    Inventory::builtin()
        .configure(DEFAULT_ENVIRONMENT, None, None)
        .expect("builtin inventory configures")
}

fn options(parallel: bool) -> DeployOptions {
    if parallel {
        DeployOptions::default()
    } else {
        DeployOptions::sequential(Pipeline::full())
    }
}

// ---------------------------------------------------------------------------
// 1. Whole-fleet outcomes
// ---------------------------------------------------------------------------

#[rstest]
#[case::sequential(false)]
#[case::parallel(true)]
#[tokio::test]
async fn every_host_succeeds(#[case] parallel: bool) {
    let cfg = fleet();
    let mock = Arc::new(MockRunner::new());

    let report = Orchestrator::new(&cfg, mock.clone())
        .deploy(&cfg.hosts, &options(parallel))
        .await;

    assert_eq!(report.outcomes.len(), 6);
    assert!(report.is_success());
    assert_eq!(report.success_count(), 6);
    assert_eq!(mock.call_count(), 6 * 7);
    for outcome in &report.outcomes {
        let phases: Vec<_> = outcome.completed.iter().map(|p| p.phase).collect();
        assert_eq!(phases, Phase::ALL);
    }
}

#[rstest]
#[case::sequential(false)]
#[case::parallel(true)]
#[tokio::test]
async fn one_failing_build_does_not_stop_the_fleet(#[case] parallel: bool) {
    let cfg = fleet();
    let mock = Arc::new(MockRunner::new().fail_on("daria03", "go build", 2));

    let report = Orchestrator::new(&cfg, mock.clone())
        .deploy(&cfg.hosts, &options(parallel))
        .await;

    assert!(!report.is_success());
    assert_eq!(report.success_count(), 5);
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].target.host.as_str(), "daria03");
    assert_eq!(failed[0].state, HostState::Failed(Phase::Build));

    let failure = failed[0].failure.as_ref().expect("failure recorded");
    assert_eq!(failure.phase, Phase::Build);
    assert_eq!(failure.error.kind(), "execution");

    // Restart never ran on the broken host, but did everywhere else.
    assert!(mock
        .commands_for("daria03")
        .iter()
        .all(|c| !c.contains("supervisorctl")));
    assert!(mock
        .commands_for("daria04")
        .iter()
        .any(|c| c.contains("supervisorctl restart")));
}

#[tokio::test]
async fn outcomes_follow_host_set_order() {
    let cfg = fleet();
    // Slow commands let later hosts finish first if order were not preserved.
    let mock = Arc::new(MockRunner::new().unreachable("daria01").with_delay(Duration::from_millis(5)));

    let report = Orchestrator::new(&cfg, mock)
        .deploy(&cfg.hosts, &DeployOptions::default())
        .await;

    let hosts: Vec<_> = report.outcomes.iter().map(|o| o.target.host.to_string()).collect();
    assert_eq!(
        hosts,
        ["daria01", "daria02", "daria03", "daria04", "daria05", "daria06"]
    );
}

#[tokio::test]
async fn unreachable_host_is_reported_as_transport() {
    let cfg = fleet();
    let mock = Arc::new(MockRunner::new().unreachable("daria05"));

    let report = Orchestrator::new(&cfg, mock.clone())
        .deploy(&cfg.hosts, &DeployOptions::default())
        .await;

    assert_eq!(report.failure_count(), 1);
    let failed = report.failures().next().expect("one failure");
    assert_eq!(failed.target.host.as_str(), "daria05");
    assert_eq!(failed.state, HostState::Failed(Phase::Pull));
    assert_eq!(failed.failure.as_ref().map(|f| f.error.kind()), Some("transport"));
    // Transport failure on the first command stops that host immediately.
    assert_eq!(mock.commands_for("daria05").len(), 1);
}

// ---------------------------------------------------------------------------
// 2. Pull semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_sync_is_tolerated_and_recorded() {
    let cfg = fleet();
    let mock = Arc::new(MockRunner::new().fail_on("daria02", "git pull", 1));

    let report = Orchestrator::new(&cfg, mock.clone())
        .deploy(&cfg.hosts, &DeployOptions::default())
        .await;

    assert!(report.is_success());
    let host = &report.outcomes[1];
    let tolerated: Vec<_> = host.tolerated().collect();
    assert_eq!(tolerated.len(), 1);
    assert_eq!(tolerated[0].step, "sync");
    assert_eq!(tolerated[0].exit_code, 1);
    assert!(mock.commands_for("daria02").iter().any(|c| c.ends_with("go build")));
}

#[rstest]
#[case::fetch("git fetch")]
#[case::checkout("git checkout")]
#[tokio::test]
async fn failed_fetch_or_checkout_fails_pull(#[case] needle: &str) {
    let cfg = fleet();
    let mock = Arc::new(MockRunner::new().fail_on("daria01", needle, 128));

    let report = Orchestrator::new(&cfg, mock.clone())
        .deploy(&cfg.hosts, &DeployOptions::default())
        .await;

    assert_eq!(report.outcomes[0].state, HostState::Failed(Phase::Pull));
    assert!(mock.commands_for("daria01").iter().all(|c| !c.contains("go ")));
}

#[tokio::test]
async fn single_phase_pull_reports_branch_checkout() {
    let cfg = Inventory::builtin()
        .configure(DEFAULT_ENVIRONMENT, Some("hotfix"), None)
        .expect("configure");
    let mock = Arc::new(MockRunner::new());
    let orchestrator = Orchestrator::new(&cfg, mock.clone());

    let report = orchestrator.pull(&cfg.hosts.targets[2]).await.expect("pull");

    assert_eq!(report.phase, Phase::Pull);
    assert!(mock
        .commands_for("daria03")
        .iter()
        .any(|c| c.ends_with("git checkout --quiet 'hotfix'")));
}

// ---------------------------------------------------------------------------
// 3. Configuration errors
// ---------------------------------------------------------------------------

#[rstest]
#[case::pull(Phase::Pull)]
#[case::build(Phase::Build)]
#[case::restart(Phase::Restart)]
#[tokio::test]
async fn unconfigured_target_fails_before_any_command(#[case] phase: Phase) {
    let cfg = fleet();
    let mock = Arc::new(MockRunner::new());
    let orchestrator = Orchestrator::new(&cfg, mock.clone());
    let target = DeploymentTarget::default();

    let result = match phase {
        Phase::Pull => orchestrator.pull(&target).await,
        Phase::Build => orchestrator.build(&target).await,
        Phase::Restart => orchestrator.restart(&target).await,
    };

    assert!(matches!(result, Err(DeployError::Config(_))));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn unconfigured_host_in_fleet_is_a_configuration_failure() {
    let cfg = fleet();
    let mock = Arc::new(MockRunner::new());
    let mut targets = cfg.hosts.targets.clone();
    targets[1].branch = Default::default();
    let hosts = HostSet::new(targets);

    let report = Orchestrator::new(&cfg, mock.clone())
        .deploy(&hosts, &DeployOptions::default())
        .await;

    assert_eq!(report.failure_count(), 1);
    assert_eq!(
        report.outcomes[1].failure.as_ref().map(|f| f.error.kind()),
        Some("configuration")
    );
    assert!(mock.commands_for("daria02").is_empty());
}

// ---------------------------------------------------------------------------
// 4. Concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn parallel_respects_max_in_flight() {
    let cfg = fleet();
    let mock = Arc::new(MockRunner::new().with_delay(Duration::from_millis(10)));

    let report = Orchestrator::new(&cfg, mock.clone())
        .deploy(&cfg.hosts, &DeployOptions::parallel(Pipeline::full(), 2))
        .await;

    assert!(report.is_success());
    assert_eq!(mock.peak_in_flight(), 2);
}

#[tokio::test]
async fn slow_host_does_not_hold_back_later_hosts() {
    let cfg = fleet();
    let hosts = HostSet::new(cfg.hosts.targets[..3].to_vec());
    let mock = Arc::new(
        MockRunner::new()
            .with_delay(Duration::from_millis(10))
            .with_host_delay("daria01", Duration::from_millis(400)),
    );

    let report = Orchestrator::new(&cfg, mock.clone())
        .deploy(&hosts, &DeployOptions::parallel(Pipeline::only(Phase::Restart), 2))
        .await;

    assert!(report.is_success());
    // daria03 takes daria02's freed slot while daria01 is still on its
    // first command.
    let order: Vec<_> = mock.calls().into_iter().map(|c| c.host).collect();
    let daria01_second = order
        .iter()
        .enumerate()
        .filter(|(_, h)| *h == "daria01")
        .nth(1)
        .map(|(i, _)| i)
        .expect("daria01 ran two commands");
    let daria03_first = order
        .iter()
        .position(|h| h == "daria03")
        .expect("daria03 ran");
    assert!(daria03_first < daria01_second, "call order: {order:?}");

    let reported: Vec<_> = report.outcomes.iter().map(|o| o.target.host.to_string()).collect();
    assert_eq!(reported, ["daria01", "daria02", "daria03"]);
}

#[tokio::test]
async fn unbounded_parallel_runs_whole_fleet_at_once() {
    let cfg = fleet();
    let mock = Arc::new(MockRunner::new().with_delay(Duration::from_millis(10)));

    Orchestrator::new(&cfg, mock.clone())
        .deploy(&cfg.hosts, &DeployOptions::parallel(Pipeline::full(), 0))
        .await;

    assert_eq!(mock.peak_in_flight(), 6);
}

#[tokio::test]
async fn sequential_never_overlaps_hosts() {
    let cfg = fleet();
    let mock = Arc::new(MockRunner::new().with_delay(Duration::from_millis(2)));

    Orchestrator::new(&cfg, mock.clone())
        .deploy(&cfg.hosts, &DeployOptions::sequential(Pipeline::full()))
        .await;

    assert_eq!(mock.peak_in_flight(), 1);
    // Host N finishes every command before host N+1 starts.
    let order: Vec<_> = mock.calls().into_iter().map(|c| c.host).collect();
    let mut hosts = order.clone();
    hosts.dedup();
    assert_eq!(hosts.len(), 6);
}

// ---------------------------------------------------------------------------
// 5. Shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_before_deploy_cancels_every_host() {
    let cfg = fleet();
    let mock = Arc::new(MockRunner::new());
    let (handle, shutdown) = shutdown_channel();
    handle.trigger();

    let report = Orchestrator::new(&cfg, mock.clone())
        .with_shutdown(shutdown)
        .deploy(&cfg.hosts, &DeployOptions::default())
        .await;

    assert_eq!(report.failure_count(), 6);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.failure.as_ref().map(|f| f.error.kind()) == Some("cancelled")));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn cancelled_error_names_host() {
    let cfg = fleet();
    let (handle, shutdown) = shutdown_channel();
    handle.trigger();
    let orchestrator = Orchestrator::new(&cfg, Arc::new(MockRunner::new())).with_shutdown(shutdown);

    let err = orchestrator
        .restart(&cfg.hosts.targets[0])
        .await
        .unwrap_err();

    match err {
        DeployError::Remote(RemoteError::Cancelled { host }) => assert_eq!(host, "daria01"),
        other => panic!("expected cancellation, got {other:?}"),
    }
}
