//! KDL schema for editgate config files.
//!
//! This module provides:
//! - `EditGateConfig`, the Rust view of a config.kdl file
//! - Conversion to and from KDL documents
//! - Validation and merging
//!
//! # KDL Schema
//!
//! ```kdl
//! pending-ttl-secs 300
//! backup-suffix "bak"
//! allowed-root "/home/me/project"
//! allowed-root "/tmp/scratch"
//! action-log-enabled #true
//! action-log-path "/var/log/editgate.log"
//! output-format "human"  // or "json"
//! preview-max-lines 200
//! ```

use kdl::KdlDocument;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings read from a config.kdl file. Every field is optional so that
/// files can be layered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditGateConfig {
    /// Seconds a staged edit stays approvable
    pub pending_ttl_secs: Option<u64>,

    /// Suffix for backup files
    pub backup_suffix: Option<String>,

    /// Directories edits may touch (repeatable `allowed-root` nodes)
    pub allowed_roots: Vec<PathBuf>,

    pub action_log_enabled: Option<bool>,

    pub action_log_path: Option<PathBuf>,

    /// Default output format for CLI commands
    pub output_format: Option<OutputFormat>,

    /// Maximum diff lines shown in a preview
    pub preview_max_lines: Option<usize>,
}

impl EditGateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.pending_ttl_secs == Some(0) {
            return Err("pending-ttl-secs must be greater than 0".to_string());
        }
        if let Some(ref suffix) = self.backup_suffix {
            if suffix.is_empty() || suffix.contains(['/', '\\']) {
                return Err(format!(
                    "backup-suffix must be a non-empty file name fragment, got {:?}",
                    suffix
                ));
            }
        }
        if self.preview_max_lines == Some(0) {
            return Err("preview-max-lines must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Parse config from a KDL document. Unknown nodes and mistyped values
    /// are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        if let Some(i) = first_integer(doc, "pending-ttl-secs") {
            if i > 0 {
                config.pending_ttl_secs = u64::try_from(i).ok();
            }
        }

        config.backup_suffix = first_string(doc, "backup-suffix");

        config.allowed_roots = doc
            .nodes()
            .iter()
            .filter(|n| n.name().value() == "allowed-root")
            .filter_map(|n| n.entries().first())
            .filter_map(|e| e.value().as_string())
            .map(PathBuf::from)
            .collect();

        if let Some(node) = doc.get("action-log-enabled") {
            config.action_log_enabled = node.entries().first().and_then(|e| e.value().as_bool());
        }

        config.action_log_path = first_string(doc, "action-log-path").map(PathBuf::from);

        config.output_format =
            first_string(doc, "output-format").and_then(|s| OutputFormat::parse(&s));

        if let Some(i) = first_integer(doc, "preview-max-lines") {
            if i > 0 {
                config.preview_max_lines = usize::try_from(i).ok();
            }
        }

        config
    }

    /// Parse config from KDL text.
    pub fn parse(content: &str) -> Result<Self> {
        let doc: KdlDocument = content
            .parse()
            .map_err(|e| Error::Config(format!("Failed to parse KDL: {}", e)))?;
        let config = Self::from_kdl(&doc);
        config.validate().map_err(Error::Config)?;
        Ok(config)
    }

    /// Load config from a file path.
    ///
    /// Returns an empty config if the file doesn't exist.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }
}

fn first_string(doc: &KdlDocument, name: &str) -> Option<String> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn first_integer(doc: &KdlDocument, name: &str) -> Option<i128> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .and_then(|e| e.value().as_integer())
}
