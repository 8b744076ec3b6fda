//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`EG_PENDING_TTL_SECS`, `EG_ACTION_LOG`)
//! 3. Project config (`./.editgate.kdl`, or the file given with `--config`)
//! 4. System config (`~/.config/editgate/config.kdl`)
//! 5. Built-in defaults

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::committer::DEFAULT_BACKUP_SUFFIX;
use crate::config::{EditGateConfig, OutputFormat};
use crate::planner::DEFAULT_PREVIEW_MAX_LINES;
use crate::store::DEFAULT_TTL_SECS;
use crate::{Error, Result};

/// Environment variable overriding the pending edit TTL.
pub const PENDING_TTL_ENV: &str = "EG_PENDING_TTL_SECS";

/// Environment variable toggling the action log: `0`/`false`/`off`
/// disables it, `1`/`true`/`on` enables it, anything else is a log path.
pub const ACTION_LOG_ENV: &str = "EG_ACTION_LOG";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from the project config file
    Project,
    /// Value from a config file named on the command line
    ConfigFile(String),
    /// Value from the system config file
    System,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::Project => write!(f, "project"),
            ValueSource::ConfigFile(path) => write!(f, "file:{}", path),
            ValueSource::System => write!(f, "system"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// One line of `eg config show`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: serde_json::Value,
    pub source: String,
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub pending_ttl_secs: Resolved<u64>,
    pub backup_suffix: Resolved<String>,
    /// Directories edits may touch
    pub allowed_roots: Resolved<Vec<PathBuf>>,
    pub action_log_enabled: Resolved<bool>,
    /// `None` when no data directory could be determined
    pub action_log_path: Option<Resolved<PathBuf>>,
    pub output_format: Resolved<OutputFormat>,
    pub preview_max_lines: Resolved<usize>,
}

impl ResolvedConfig {
    /// Built-in defaults, with `root` as the only allowed root.
    pub fn defaults(root: PathBuf, action_log_path: Option<PathBuf>) -> Self {
        Self {
            pending_ttl_secs: Resolved::new(DEFAULT_TTL_SECS as u64, ValueSource::Default),
            backup_suffix: Resolved::new(DEFAULT_BACKUP_SUFFIX.to_string(), ValueSource::Default),
            allowed_roots: Resolved::new(vec![root], ValueSource::Default),
            action_log_enabled: Resolved::new(true, ValueSource::Default),
            action_log_path: action_log_path.map(|p| Resolved::new(p, ValueSource::Default)),
            output_format: Resolved::new(OutputFormat::Json, ValueSource::Default),
            preview_max_lines: Resolved::new(DEFAULT_PREVIEW_MAX_LINES, ValueSource::Default),
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format.value
    }

    /// The log path to write to, if logging is enabled.
    pub fn action_log(&self) -> Option<&Path> {
        if !self.action_log_enabled.value {
            return None;
        }
        self.action_log_path.as_ref().map(|r| r.value.as_path())
    }

    /// Every setting with its value and source, in display order.
    pub fn entries(&self) -> Vec<ConfigEntry> {
        fn entry<T: Serialize>(key: &'static str, r: &Resolved<T>) -> ConfigEntry {
            ConfigEntry {
                key,
                value: serde_json::to_value(&r.value).unwrap_or(serde_json::Value::Null),
                source: r.source.to_string(),
            }
        }

        let mut entries = vec![
            entry("pending-ttl-secs", &self.pending_ttl_secs),
            entry("backup-suffix", &self.backup_suffix),
            entry("allowed-root", &self.allowed_roots),
            entry("action-log-enabled", &self.action_log_enabled),
        ];
        entries.push(match self.action_log_path {
            Some(ref path) => entry("action-log-path", path),
            None => ConfigEntry {
                key: "action-log-path",
                value: serde_json::Value::Null,
                source: ValueSource::Default.to_string(),
            },
        });
        entries.push(entry("output-format", &self.output_format));
        entries.push(entry("preview-max-lines", &self.preview_max_lines));
        entries
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub pending_ttl_secs: Option<u64>,
    pub backup_suffix: Option<String>,
    pub allowed_roots: Vec<PathBuf>,
    pub action_log_enabled: Option<bool>,
    pub action_log_path: Option<PathBuf>,
    pub output_format: Option<OutputFormat>,
    pub preview_max_lines: Option<usize>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allowed_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.allowed_roots.push(root.into());
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }
}

/// The config files found on disk.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayers {
    pub system: EditGateConfig,
    pub project: EditGateConfig,
    /// Source label for the project layer
    pub project_source: Option<ValueSource>,
}

/// Settings taken from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EnvSettings {
    pending_ttl_secs: Option<u64>,
    action_log_enabled: Option<bool>,
    action_log_path: Option<PathBuf>,
}

fn read_env(env: &dyn Fn(&str) -> Option<String>) -> Result<EnvSettings> {
    let mut settings = EnvSettings::default();

    if let Some(raw) = env(PENDING_TTL_ENV).filter(|v| !v.is_empty()) {
        let secs: u64 = raw.trim().parse().map_err(|_| {
            Error::Config(format!(
                "{} must be a positive integer, got {:?}",
                PENDING_TTL_ENV, raw
            ))
        })?;
        if secs == 0 {
            return Err(Error::Config(format!(
                "{} must be greater than 0",
                PENDING_TTL_ENV
            )));
        }
        settings.pending_ttl_secs = Some(secs);
    }

    if let Some(raw) = env(ACTION_LOG_ENV).filter(|v| !v.is_empty()) {
        match raw.to_lowercase().as_str() {
            "0" | "false" | "off" | "no" => settings.action_log_enabled = Some(false),
            "1" | "true" | "on" | "yes" => settings.action_log_enabled = Some(true),
            _ => {
                settings.action_log_enabled = Some(true);
                settings.action_log_path = Some(PathBuf::from(raw));
            }
        }
    }

    Ok(settings)
}

/// Choose the highest-precedence value that is set.
fn pick<T>(
    cli: Option<T>,
    env: Option<(T, &str)>,
    project: Option<T>,
    project_source: &ValueSource,
    system: Option<T>,
) -> Option<Resolved<T>> {
    if let Some(v) = cli {
        return Some(Resolved::new(v, ValueSource::CliFlag));
    }
    if let Some((v, name)) = env {
        return Some(Resolved::new(v, ValueSource::EnvVar(name.to_string())));
    }
    if let Some(v) = project {
        return Some(Resolved::new(v, project_source.clone()));
    }
    system.map(|v| Resolved::new(v, ValueSource::System))
}

/// Resolve configuration against the process environment.
pub fn resolve_config(
    layers: &ConfigLayers,
    overrides: &ConfigOverrides,
    defaults: ResolvedConfig,
) -> Result<ResolvedConfig> {
    resolve_config_with_env(layers, overrides, defaults, &|name| std::env::var(name).ok())
}

/// Resolve configuration with an explicit environment lookup.
pub fn resolve_config_with_env(
    layers: &ConfigLayers,
    overrides: &ConfigOverrides,
    defaults: ResolvedConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let env = read_env(env)?;
    let project_source = layers
        .project_source
        .clone()
        .unwrap_or(ValueSource::Project);
    let system = &layers.system;
    let project = &layers.project;
    let mut result = defaults;

    if let Some(r) = pick(
        overrides.pending_ttl_secs,
        env.pending_ttl_secs.map(|v| (v, PENDING_TTL_ENV)),
        project.pending_ttl_secs,
        &project_source,
        system.pending_ttl_secs,
    ) {
        result.pending_ttl_secs = r;
    }

    if let Some(r) = pick(
        overrides.backup_suffix.clone(),
        None,
        project.backup_suffix.clone(),
        &project_source,
        system.backup_suffix.clone(),
    ) {
        result.backup_suffix = r;
    }

    let non_empty = |roots: &Vec<PathBuf>| (!roots.is_empty()).then(|| roots.clone());
    if let Some(r) = pick(
        non_empty(&overrides.allowed_roots),
        None,
        non_empty(&project.allowed_roots),
        &project_source,
        non_empty(&system.allowed_roots),
    ) {
        result.allowed_roots = r;
    }

    if let Some(r) = pick(
        overrides.action_log_enabled,
        env.action_log_enabled.map(|v| (v, ACTION_LOG_ENV)),
        project.action_log_enabled,
        &project_source,
        system.action_log_enabled,
    ) {
        result.action_log_enabled = r;
    }

    if let Some(r) = pick(
        overrides.action_log_path.clone(),
        env.action_log_path.clone().map(|v| (v, ACTION_LOG_ENV)),
        project.action_log_path.clone(),
        &project_source,
        system.action_log_path.clone(),
    ) {
        result.action_log_path = Some(r);
    }

    if let Some(r) = pick(
        overrides.output_format,
        None,
        project.output_format,
        &project_source,
        system.output_format,
    ) {
        result.output_format = r;
    }

    if let Some(r) = pick(
        overrides.preview_max_lines,
        None,
        project.preview_max_lines,
        &project_source,
        system.preview_max_lines,
    ) {
        result.preview_max_lines = r;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn defaults() -> ResolvedConfig {
        ResolvedConfig::defaults(PathBuf::from("/work"), Some(PathBuf::from("/data/action.log")))
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn resolve(layers: &ConfigLayers, overrides: &ConfigOverrides) -> ResolvedConfig {
        resolve_config_with_env(layers, overrides, defaults(), &no_env).unwrap()
    }

    #[test]
    fn test_value_source_display() {
        assert_eq!(
            format!("{}", ValueSource::EnvVar("FOO".to_string())),
            "env:FOO"
        );
        assert_eq!(format!("{}", ValueSource::Project), "project");
        assert_eq!(
            format!("{}", ValueSource::ConfigFile("/x.kdl".to_string())),
            "file:/x.kdl"
        );
        assert_eq!(format!("{}", ValueSource::System), "system");
        assert_eq!(format!("{}", ValueSource::CliFlag), "cli");
        assert_eq!(format!("{}", ValueSource::Default), "default");
    }

    #[test]
    fn test_resolve_config_defaults() {
        let config = resolve(&ConfigLayers::default(), &ConfigOverrides::default());

        assert_eq!(config.pending_ttl_secs.value, 300);
        assert_eq!(config.pending_ttl_secs.source, ValueSource::Default);
        assert_eq!(config.backup_suffix.value, "bak");
        assert_eq!(config.allowed_roots.value, vec![PathBuf::from("/work")]);
        assert_eq!(config.output_format(), OutputFormat::Json);
        assert_eq!(config.action_log(), Some(Path::new("/data/action.log")));
    }

    #[test]
    fn test_project_overrides_system() {
        let layers = ConfigLayers {
            system: EditGateConfig {
                pending_ttl_secs: Some(100),
                backup_suffix: Some("sys".to_string()),
                ..Default::default()
            },
            project: EditGateConfig {
                pending_ttl_secs: Some(50),
                ..Default::default()
            },
            project_source: None,
        };
        let config = resolve(&layers, &ConfigOverrides::default());

        assert_eq!(config.pending_ttl_secs.value, 50);
        assert_eq!(config.pending_ttl_secs.source, ValueSource::Project);
        assert_eq!(config.backup_suffix.value, "sys");
        assert_eq!(config.backup_suffix.source, ValueSource::System);
    }

    #[test]
    fn test_cli_overrides_everything() {
        let layers = ConfigLayers {
            project: EditGateConfig {
                output_format: Some(OutputFormat::Json),
                allowed_roots: vec![PathBuf::from("/project")],
                ..Default::default()
            },
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            pending_ttl_secs: Some(9),
            ..ConfigOverrides::new()
                .with_output_format(OutputFormat::Human)
                .with_allowed_root("/cli")
        };
        let env: HashMap<&str, &str> = [(PENDING_TTL_ENV, "77")].into_iter().collect();

        let config = resolve_config_with_env(&layers, &overrides, defaults(), &|k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.output_format(), OutputFormat::Human);
        assert_eq!(config.output_format.source, ValueSource::CliFlag);
        assert_eq!(config.allowed_roots.value, vec![PathBuf::from("/cli")]);
        assert_eq!(config.pending_ttl_secs.value, 9);
    }

    #[test]
    fn test_env_overrides_files() {
        let layers = ConfigLayers {
            project: EditGateConfig {
                pending_ttl_secs: Some(50),
                action_log_enabled: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        let env: HashMap<&str, &str> = [(PENDING_TTL_ENV, "42"), (ACTION_LOG_ENV, "off")]
            .into_iter()
            .collect();

        let config = resolve_config_with_env(&layers, &ConfigOverrides::default(), defaults(), &|k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.pending_ttl_secs.value, 42);
        assert_eq!(
            config.pending_ttl_secs.source,
            ValueSource::EnvVar(PENDING_TTL_ENV.to_string())
        );
        assert!(!config.action_log_enabled.value);
        assert_eq!(config.action_log(), None);
    }

    #[test]
    fn test_action_log_env_path() {
        let config = resolve_config_with_env(
            &ConfigLayers::default(),
            &ConfigOverrides::default(),
            defaults(),
            &|k| (k == ACTION_LOG_ENV).then(|| "/tmp/custom.log".to_string()),
        )
        .unwrap();
        assert_eq!(config.action_log(), Some(Path::new("/tmp/custom.log")));
    }

    #[test]
    fn test_invalid_env_ttl_is_config_error() {
        let err = resolve_config_with_env(
            &ConfigLayers::default(),
            &ConfigOverrides::default(),
            defaults(),
            &|k| (k == PENDING_TTL_ENV).then(|| "soon".to_string()),
        )
        .unwrap_err();
        assert!(err.to_string().contains(PENDING_TTL_ENV));
    }

    #[test]
    fn test_explicit_config_file_source() {
        let layers = ConfigLayers {
            project: EditGateConfig {
                preview_max_lines: Some(5),
                ..Default::default()
            },
            project_source: Some(ValueSource::ConfigFile("/etc/eg.kdl".to_string())),
            ..Default::default()
        };
        let config = resolve(&layers, &ConfigOverrides::default());
        assert_eq!(config.preview_max_lines.value, 5);
        assert_eq!(
            config.preview_max_lines.source,
            ValueSource::ConfigFile("/etc/eg.kdl".to_string())
        );
    }

    #[test]
    fn test_entries_list_every_key() {
        let config = resolve(&ConfigLayers::default(), &ConfigOverrides::default());
        let keys: Vec<&str> = config.entries().iter().map(|e| e.key).collect();
        assert_eq!(
            keys,
            [
                "pending-ttl-secs",
                "backup-suffix",
                "allowed-root",
                "action-log-enabled",
                "action-log-path",
                "output-format",
                "preview-max-lines"
            ]
        );
        assert_eq!(config.entries()[0].value, serde_json::json!(300));
        assert_eq!(config.entries()[5].value, serde_json::json!("json"));
    }
}
