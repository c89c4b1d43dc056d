//! Inventory file persistence.
//!
//! # Storage layout
//!
//! ```text
//! ~/.fleetup/
//!   inventory.yaml   (mode 0600, written by `fleetup inventory init`)
//! ```
//!
//! # API pattern
//!
//! Functions taking a path (`load_at`, `save_at`, `init_at`) do the work;
//! the no-arg wrappers derive the path from `dirs::home_dir()`.
//! Tests must use the `_at` forms with a `TempDir`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::Inventory;

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.fleetup/inventory.yaml`; pure, no I/O.
pub fn default_inventory_path_at(home: &Path) -> PathBuf {
    home.join(".fleetup").join("inventory.yaml")
}

/// `default_inventory_path_at` convenience wrapper.
pub fn default_inventory_path() -> Result<PathBuf, ConfigError> {
    Ok(default_inventory_path_at(&home()?))
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load and validate the inventory at `path`.
///
/// Returns `ConfigError::InventoryNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<Inventory, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::InventoryNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let inventory: Inventory =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
    validate(&inventory)?;
    Ok(inventory)
}

/// Load `path` if it exists, otherwise fall back to [`Inventory::builtin`].
pub fn load_or_builtin(path: &Path) -> Result<Inventory, ConfigError> {
    if path.exists() {
        load_at(path)
    } else {
        Ok(Inventory::builtin())
    }
}

/// `load_at` convenience wrapper for the default location.
pub fn load() -> Result<Inventory, ConfigError> {
    load_at(&default_inventory_path()?)
}

/// Structural checks that serde cannot express.
pub fn validate(inventory: &Inventory) -> Result<(), ConfigError> {
    if inventory.version != Inventory::CURRENT_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            found: inventory.version,
            expected: Inventory::CURRENT_VERSION,
        });
    }

    let mut seen = BTreeSet::new();
    for env in &inventory.environments {
        if !seen.insert(env.name.0.as_str()) {
            return Err(ConfigError::DuplicateEnvironment {
                name: env.name.0.clone(),
            });
        }
        for host in &env.hosts {
            if host.address.is_empty() || host.user.is_empty() {
                return Err(ConfigError::InvalidHost {
                    environment: env.name.0.clone(),
                    reason: format!("'{}' needs both address and user", host.destination()),
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save the inventory to `path`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(path: &Path, inventory: &Inventory) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            set_dir_permissions(parent)?;
        }
    }
    let tmp_path = tmp_sibling(path);

    let yaml = serde_yaml::to_string(inventory)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Write the built-in inventory to `path`.
///
/// Idempotent: if the file already exists and `force` is false, loads and
/// returns it unchanged.
pub fn init_at(path: &Path, force: bool) -> Result<Inventory, ConfigError> {
    if path.exists() && !force {
        return load_at(path);
    }
    let inventory = Inventory::builtin();
    save_at(path, &inventory)?;
    Ok(inventory)
}

/// `init_at` convenience wrapper for the default location.
pub fn init(force: bool) -> Result<Inventory, ConfigError> {
    init_at(&default_inventory_path()?, force)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "inventory.yaml".to_string());
    path.with_file_name(format!("{name}.tmp"))
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
