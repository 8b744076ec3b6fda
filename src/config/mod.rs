//! Configuration for editgate.
//!
//! Settings live in KDL files:
//!
//! - System: `~/.config/editgate/config.kdl` (`EG_CONFIG_DIR` overrides the directory)
//! - Project: `./.editgate.kdl`, or the file passed with `--config`
//!
//! The action log defaults to `~/.local/share/editgate/action.log`
//! (`EG_DATA_DIR` overrides the directory).
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

use std::path::{Path, PathBuf};

use crate::Result;

pub use resolver::{
    ACTION_LOG_ENV, ConfigEntry, ConfigLayers, ConfigOverrides, PENDING_TTL_ENV, Resolved,
    ResolvedConfig, ValueSource, resolve_config, resolve_config_with_env,
};
pub use schema::{EditGateConfig, OutputFormat};

/// Overrides the system config directory.
pub const CONFIG_DIR_ENV: &str = "EG_CONFIG_DIR";

/// Overrides the data directory holding the action log.
pub const DATA_DIR_ENV: &str = "EG_DATA_DIR";

/// Project config file name, looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = ".editgate.kdl";

fn env_dir(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Path of the system config file.
pub fn system_config_path() -> Option<PathBuf> {
    env_dir(CONFIG_DIR_ENV)
        .or_else(|| dirs::config_dir().map(|d| d.join("editgate")))
        .map(|d| d.join("config.kdl"))
}

/// Default path of the action log.
pub fn default_action_log_path() -> Option<PathBuf> {
    env_dir(DATA_DIR_ENV)
        .or_else(|| dirs::data_dir().map(|d| d.join("editgate")))
        .map(|d| d.join("action.log"))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// Read the config files that apply to `cwd`.
///
/// `explicit` replaces the project file when given; unlike the project
/// file it must exist.
pub fn load_layers(cwd: &Path, explicit: Option<&Path>) -> Result<ConfigLayers> {
    let system = match system_config_path() {
        Some(path) => EditGateConfig::load_file(&path)?,
        None => EditGateConfig::default(),
    };

    let (project, project_source) = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(crate::Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            (
                EditGateConfig::load_file(path)?,
                ValueSource::ConfigFile(path.display().to_string()),
            )
        }
        None => (
            EditGateConfig::load_file(&cwd.join(PROJECT_CONFIG_FILE))?,
            ValueSource::Project,
        ),
    };

    Ok(ConfigLayers {
        system,
        project,
        project_source: Some(project_source),
    })
}

/// Load and resolve configuration for the current process.
pub fn load_config(explicit: Option<&Path>, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir()?;
    let layers = load_layers(&cwd, explicit)?;
    let defaults = ResolvedConfig::defaults(cwd, default_action_log_path());
    let mut resolved = resolve_config(&layers, overrides, defaults)?;

    if let Some(ref mut path) = resolved.action_log_path {
        path.value = expand_home(&path.value);
    }
    for root in resolved.allowed_roots.value.iter_mut() {
        *root = expand_home(root);
    }
    Ok(resolved)
}
