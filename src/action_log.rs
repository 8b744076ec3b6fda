//! Action logging for editgate operations.
//!
//! Every service operation is appended to a JSONL file: what was asked,
//! whether it succeeded, and how long it took. Arguments are sanitized
//! before they are written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Represents a single action log entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionLog {
    /// ISO 8601 timestamp when the action occurred
    pub timestamp: DateTime<Utc>,

    /// Operation name (e.g., "prepare_replace_lines", "approve_edit")
    pub operation: String,

    /// Operation arguments as JSON
    pub args: serde_json::Value,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    /// Error message if the operation failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_ms: u64,

    /// User who ran the operation
    pub user: String,
}

/// Appends action log entries to a file, or does nothing when disabled.
#[derive(Debug, Clone, Default)]
pub struct ActionLogger {
    path: Option<PathBuf>,
}

impl ActionLogger {
    /// Log to `path`; `None` disables logging.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record one operation.
    ///
    /// This never fails: write errors are reported through `tracing` so a
    /// broken log can't break an edit.
    pub fn record(
        &self,
        operation: &str,
        args: &serde_json::Value,
        success: bool,
        error: Option<(&str, String)>,
        duration_ms: u64,
    ) {
        let Some(ref path) = self.path else {
            return;
        };

        let (error_kind, error) = match error {
            Some((kind, message)) => (Some(kind.to_string()), Some(message)),
            None => (None, None),
        };
        let entry = ActionLog {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            args: sanitize_args(args),
            success,
            error_kind,
            error,
            duration_ms,
            user: get_current_user(),
        };

        if let Err(e) = write_log_entry(path, &entry) {
            warn!(path = %path.display(), error = %e, "failed to write action log");
        }
    }
}

/// Write a log entry to the log file.
fn write_log_entry(path: &Path, entry: &ActionLog) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", json)?;

    Ok(())
}

/// Sanitize arguments to remove sensitive data.
///
/// Values under sensitive keys are redacted, paths are reduced to their
/// file names, long strings are truncated and large arrays summarized.
pub fn sanitize_args(args: &serde_json::Value) -> serde_json::Value {
    match args {
        serde_json::Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, value) in map {
                let key_lower = key.to_lowercase();
                if key_lower.contains("password")
                    || key_lower.contains("token")
                    || key_lower.contains("key")
                    || key_lower.contains("secret")
                {
                    sanitized.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    sanitized.insert(key.clone(), sanitize_args(value));
                }
            }
            serde_json::Value::Object(sanitized)
        }
        serde_json::Value::Array(arr) => {
            if arr.len() > 10 {
                serde_json::Value::String(format!("[Array with {} items]", arr.len()))
            } else {
                serde_json::Value::Array(arr.iter().map(sanitize_args).collect())
            }
        }
        serde_json::Value::String(s) => {
            let sanitized = if s.contains('/') || s.contains('\\') {
                s.rsplit(['/', '\\']).next().unwrap_or(s).to_string()
            } else {
                s.clone()
            };

            let chars = sanitized.chars().count();
            if chars > 100 {
                let head: String = sanitized.chars().take(97).collect();
                serde_json::Value::String(format!("{}... ({} chars)", head, chars))
            } else {
                serde_json::Value::String(sanitized)
            }
        }
        _ => args.clone(),
    }
}

/// Get the current user's username.
fn get_current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_file_path() {
        let value = serde_json::json!("/very/long/path/to/file.txt");
        assert_eq!(sanitize_args(&value), serde_json::json!("file.txt"));

        let value = serde_json::json!("C:\\Users\\test\\file.txt");
        assert_eq!(sanitize_args(&value), serde_json::json!("file.txt"));
    }

    #[test]
    fn test_sanitize_long_string() {
        let value = serde_json::json!("a".repeat(150));
        let sanitized = sanitize_args(&value);
        if let serde_json::Value::String(s) = sanitized {
            assert!(s.contains("... (150 chars)"));
        } else {
            panic!("Expected string value");
        }
    }

    #[test]
    fn test_sanitize_long_multibyte_string() {
        let value = serde_json::json!("é".repeat(120));
        let sanitized = sanitize_args(&value);
        assert!(sanitized.as_str().unwrap().ends_with("... (120 chars)"));
    }

    #[test]
    fn test_sanitize_sensitive_keys() {
        let value = serde_json::json!({
            "approval_token": "edit-abc",
            "expected_version_token": "12-abcdef",
            "password": "secret123",
            "start_line": 5
        });
        let sanitized = sanitize_args(&value);

        assert_eq!(sanitized["approval_token"], "[REDACTED]");
        assert_eq!(sanitized["expected_version_token"], "[REDACTED]");
        assert_eq!(sanitized["password"], "[REDACTED]");
        assert_eq!(sanitized["start_line"], 5);
    }

    #[test]
    fn test_sanitize_large_array() {
        let arr: Vec<i32> = (0..15).collect();
        let sanitized = sanitize_args(&serde_json::json!(arr));
        assert_eq!(sanitized, serde_json::json!("[Array with 15 items]"));

        let small = serde_json::json!([1, 2, 3]);
        assert_eq!(sanitize_args(&small), small);
    }

    #[test]
    fn test_sanitize_nested_object() {
        let value = serde_json::json!({
            "request": {
                "path": "/home/user/src/main.rs",
                "secret": "x"
            }
        });
        let sanitized = sanitize_args(&value);
        assert_eq!(sanitized["request"]["path"], "main.rs");
        assert_eq!(sanitized["request"]["secret"], "[REDACTED]");
    }

    #[test]
    fn test_record_appends_jsonl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/action.log");
        let logger = ActionLogger::new(Some(path.clone()));

        logger.record(
            "prepare_delete_lines",
            &serde_json::json!({"path": "/src/a.rs", "start_line": 1}),
            true,
            None,
            3,
        );
        logger.record(
            "approve_edit",
            &serde_json::json!({"approval_token": "edit-1"}),
            false,
            Some(("version_conflict", "changed".to_string())),
            1,
        );

        let contents = fs::read_to_string(&path).unwrap();
        let entries: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["operation"], "prepare_delete_lines");
        assert_eq!(entries[0]["args"]["path"], "a.rs");
        assert!(entries[0].get("error").is_none());
        assert_eq!(entries[1]["success"], false);
        assert_eq!(entries[1]["error_kind"], "version_conflict");
        assert_eq!(entries[1]["args"]["approval_token"], "[REDACTED]");
    }

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let logger = ActionLogger::disabled();
        assert!(logger.path().is_none());
        logger.record("cancel_edit", &serde_json::json!({}), true, None, 0);
    }

    #[test]
    fn test_unwritable_log_does_not_panic() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let logger = ActionLogger::new(Some(blocker.join("action.log")));
        logger.record("list_pending_edits", &serde_json::json!({}), true, None, 0);
    }
}
