//! Roundtrip serialisation tests for inventories and host sets.
//!
//! Each `#[case]` is isolated; no shared state.

use std::path::{Path, PathBuf};

use fleetup_core::{
    inventory, BranchName, DeploymentTarget, Environment, EnvironmentName, HostAddress, HostSet,
    HostSpec, Inventory, RemoteUser, SshSettings, DEFAULT_ENVIRONMENT,
};
use rstest::rstest;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn builtin() -> Inventory {
    Inventory::builtin()
}

fn two_environments() -> Inventory {
    let mut inv = Inventory::builtin();
    inv.environments.push(Environment {
        name: EnvironmentName::from("staging"),
        hosts: vec![HostSpec {
            address: HostAddress::from("stage01.internal"),
            user: RemoteUser::from("deploy"),
            port: Some(2222),
        }],
        repo_path: PathBuf::from("/srv/stage"),
        build: Default::default(),
        supervisor: Default::default(),
        ssh: SshSettings {
            identity_file: Some(PathBuf::from("/keys/stage")),
            options: vec!["StrictHostKeyChecking=accept-new".to_string()],
            ..SshSettings::default()
        },
    });
    inv
}

fn unicode_paths() -> Inventory {
    let mut inv = Inventory::builtin();
    inv.environments[0].repo_path = PathBuf::from("/opt/приложение/サービス");
    inv
}

fn no_environments() -> Inventory {
    Inventory {
        version: Inventory::CURRENT_VERSION,
        environments: vec![],
    }
}

// ---------------------------------------------------------------------------
// Parameterised roundtrip test
// ---------------------------------------------------------------------------

#[rstest]
#[case("builtin", builtin())]
#[case("two_environments", two_environments())]
#[case("unicode_paths", unicode_paths())]
#[case("no_environments", no_environments())]
fn inventory_roundtrip_through_disk(#[case] label: &str, #[case] inv: Inventory) {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let path = dir.path().join("inventory.yaml");
    inventory::save_at(&path, &inv).unwrap_or_else(|e| panic!("[{label}] save failed: {e}"));
    let back = inventory::load_at(&path).unwrap_or_else(|e| panic!("[{label}] load failed: {e}"));
    assert_eq!(inv, back, "[{label}]");
}

// ---------------------------------------------------------------------------
// HostSet reload
// ---------------------------------------------------------------------------

#[rstest]
#[case(None, None)]
#[case(Some("release/2.1"), None)]
#[case(Some("hotfix"), Some("/srv/other"))]
fn reloaded_inventory_configures_identical_host_set(
    #[case] branch: Option<&str>,
    #[case] repo: Option<&str>,
) {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let path = dir.path().join("inventory.yaml");
    let inv = two_environments();
    inventory::save_at(&path, &inv).expect("save");
    let back = inventory::load_at(&path).expect("load");

    let repo = repo.map(Path::new);
    let before = inv.configure(DEFAULT_ENVIRONMENT, branch, repo).expect("configure");
    let after = back.configure(DEFAULT_ENVIRONMENT, branch, repo).expect("configure");
    assert_eq!(before.hosts, after.hosts);
}

#[test]
fn host_set_yaml_roundtrip() {
    let set = HostSet::new(vec![DeploymentTarget {
        host: HostAddress::from("daria03"),
        user: RemoteUser::from("user"),
        port: Some(22),
        repo_path: PathBuf::from("/opt/WWWRoot/go_language_detect/"),
        branch: BranchName::from("master"),
    }]);
    let yaml = serde_yaml::to_string(&set).expect("serialize");
    let back: HostSet = serde_yaml::from_str(&yaml).expect("deserialize");
    assert_eq!(set, back);
}

#[test]
fn every_builtin_target_defaults_to_master() {
    let cfg = builtin()
        .configure(DEFAULT_ENVIRONMENT, None, None)
        .expect("configure");
    assert_eq!(cfg.hosts.len(), 6);
    assert!(cfg.hosts.iter().all(|t| t.branch.as_str() == "master"));
}
