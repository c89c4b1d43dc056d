//! Turn an inventory environment into the configuration for one run.

use std::path::Path;

use crate::error::ConfigError;
use crate::types::{
    BranchName, DeploymentTarget, Environment, FleetConfig, HostSet, Inventory, DEFAULT_BRANCH,
};

/// Build the run configuration for `environment`.
///
/// `branch` defaults to `master`, `repo_path` to the environment's
/// configured checkout. The branch is trimmed; empty values are rejected
/// rather than replaced.
/// No side effects.
pub fn configure(
    environment: &Environment,
    branch: Option<&str>,
    repo_path: Option<&Path>,
) -> Result<FleetConfig, ConfigError> {
    let branch = BranchName::from(branch.unwrap_or(DEFAULT_BRANCH).trim());
    if branch.is_empty() {
        return Err(ConfigError::EmptyBranch);
    }

    let repo_path = repo_path.unwrap_or(&environment.repo_path);
    if repo_path.as_os_str().is_empty() {
        return Err(ConfigError::EmptyRepoPath);
    }

    if environment.hosts.is_empty() {
        return Err(ConfigError::EmptyHostList {
            environment: environment.name.0.clone(),
        });
    }

    let targets = environment
        .hosts
        .iter()
        .map(|host| DeploymentTarget {
            host: host.address.clone(),
            user: host.user.clone(),
            port: host.port,
            repo_path: repo_path.to_path_buf(),
            branch: branch.clone(),
        })
        .collect::<Vec<_>>();

    for target in &targets {
        target.validate()?;
    }

    Ok(FleetConfig {
        environment: environment.name.clone(),
        hosts: HostSet::new(targets),
        build: environment.build.clone(),
        supervisor: environment.supervisor.clone(),
        ssh: environment.ssh.clone(),
    })
}

impl Inventory {
    /// Look up `environment` and [`configure`] it.
    pub fn configure(
        &self,
        environment: &str,
        branch: Option<&str>,
        repo_path: Option<&Path>,
    ) -> Result<FleetConfig, ConfigError> {
        configure(self.environment(environment)?, branch, repo_path)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::types::DEFAULT_ENVIRONMENT;

    fn production() -> Environment {
        Inventory::builtin().environments.remove(0)
    }

    #[test]
    fn defaults_to_master_and_configured_path() {
        let cfg = configure(&production(), None, None).expect("configure");
        assert_eq!(cfg.hosts.len(), 6);
        for target in &cfg.hosts {
            assert_eq!(target.branch.as_str(), "master");
            assert_eq!(target.repo_path, PathBuf::from("/opt/WWWRoot/go_language_detect/"));
        }
    }

    #[test]
    fn explicit_branch_and_path_override_defaults() {
        let cfg = configure(&production(), Some("release"), Some(Path::new("/srv/app")))
            .expect("configure");
        assert!(cfg.hosts.iter().all(|t| t.branch.as_str() == "release"));
        assert!(cfg.hosts.iter().all(|t| t.repo_path == Path::new("/srv/app")));
    }

    #[test]
    fn empty_branch_fails_fast() {
        let err = configure(&production(), Some(""), None).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyBranch));
    }

    #[test]
    fn branch_is_trimmed_before_use() {
        let cfg = configure(&production(), Some(" dev\n"), None).expect("configure");
        assert!(cfg.hosts.iter().all(|t| t.branch.as_str() == "dev"));
    }

    #[test]
    fn whitespace_only_branch_fails_fast() {
        let err = configure(&production(), Some("   "), None).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyBranch));
    }

    #[test]
    fn empty_repo_path_fails_fast() {
        let err = configure(&production(), None, Some(Path::new(""))).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRepoPath));
    }

    #[test]
    fn empty_host_list_fails_fast() {
        let mut env = production();
        env.hosts.clear();
        let err = configure(&env, None, None).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyHostList { .. }));
    }

    #[test]
    fn inventory_configure_resolves_environment() {
        let inv = Inventory::builtin();
        let cfg = inv.configure(DEFAULT_ENVIRONMENT, None, None).expect("configure");
        assert_eq!(cfg.environment.as_str(), DEFAULT_ENVIRONMENT);
        assert!(inv.configure("staging", None, None).is_err());
    }
}
