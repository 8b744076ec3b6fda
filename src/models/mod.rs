//! Data models for editgate.
//!
//! This module defines the core data structures:
//! - `VersionToken` - Change-detection fingerprint of a file on disk
//! - `EditKind` - The closed set of structural edits
//! - `PendingEdit` - A planned-but-unapplied edit held by the store
//! - `EditPreview` / `PreparedEdit` / `AppliedEdit` - Operation payloads
//! - `EditResult` - Structured envelope returned across the tool boundary
//! - `*Request` - Tool arguments for each operation

use chrono::{DateTime, Utc};
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::{Error, ErrorKind};

/// Opaque fingerprint of a file's identity and content at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wrap a raw token string (e.g. one supplied by a caller).
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for VersionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A structural edit against a file's lines or text.
///
/// Line numbers are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditKind {
    ReplaceLines {
        start_line: usize,
        end_line: usize,
        new_text: String,
    },
    /// `line == 0` inserts before the first line.
    InsertAfterLine {
        line: usize,
        text: String,
        maintain_indentation: bool,
    },
    DeleteLines {
        start_line: usize,
        end_line: usize,
    },
    ReplaceInFile {
        search_pattern: String,
        replacement: String,
        case_sensitive: bool,
        use_regex: bool,
    },
}

impl EditKind {
    /// Short name used in summaries and logs.
    pub fn name(&self) -> &'static str {
        match self {
            EditKind::ReplaceLines { .. } => "replace_lines",
            EditKind::InsertAfterLine { .. } => "insert_after_line",
            EditKind::DeleteLines { .. } => "delete_lines",
            EditKind::ReplaceInFile { .. } => "replace_in_file",
        }
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditKind::ReplaceLines {
                start_line,
                end_line,
                ..
            } => write!(f, "replace lines {}-{}", start_line, end_line),
            EditKind::InsertAfterLine { line, .. } => write!(f, "insert after line {}", line),
            EditKind::DeleteLines {
                start_line,
                end_line,
            } => write!(f, "delete lines {}-{}", start_line, end_line),
            EditKind::ReplaceInFile {
                search_pattern,
                use_regex,
                ..
            } => {
                if *use_regex {
                    write!(f, "replace /{}/", search_pattern)
                } else {
                    write!(f, "replace \"{}\"", search_pattern)
                }
            }
        }
    }
}

/// Everything needed to stage an edit, before the store assigns a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPlan {
    pub file_path: PathBuf,
    pub kind: EditKind,
    pub expected_version_token: VersionToken,
    pub backup_requested: bool,
}

/// A planned edit awaiting approval.
///
/// Owned by the pending edit store from staging until it is applied,
/// cancelled, or expires. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEdit {
    pub approval_token: String,
    /// Absolute path of the target file
    pub file_path: PathBuf,
    pub kind: EditKind,
    /// Version of the file the plan was computed against
    pub expected_version_token: VersionToken,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub backup_requested: bool,
}

impl PendingEdit {
    /// Whether the entry has lapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn summary(&self, now: DateTime<Utc>) -> PendingEditSummary {
        PendingEditSummary {
            approval_token: self.approval_token.clone(),
            file_path: self.file_path.clone(),
            kind: self.kind.name().to_string(),
            description: self.kind.to_string(),
            expected_version_token: self.expected_version_token.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            backup_requested: self.backup_requested,
            seconds_remaining: (self.expires_at - now).num_seconds().max(0),
        }
    }
}

/// Inspection view of a pending edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEditSummary {
    pub approval_token: String,
    pub file_path: PathBuf,
    pub kind: String,
    pub description: String,
    pub expected_version_token: VersionToken,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub backup_requested: bool,
    pub seconds_remaining: i64,
}

/// Human-reviewable summary of what an edit will do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditPreview {
    pub lines_removed: usize,
    pub lines_added: usize,
    pub total_lines_before: usize,
    pub total_lines_after: usize,
    pub bytes_before: usize,
    pub bytes_after: usize,
    pub byte_delta: i64,
    /// Unified diff of the change (possibly truncated)
    pub diff: String,
}

/// Payload of a successful Prepare* operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedEdit {
    pub approval_token: String,
    pub file_path: PathBuf,
    pub expected_version_token: VersionToken,
    pub expires_at: DateTime<Utc>,
    pub preview: EditPreview,
    /// Number of pattern matches (replace-in-file only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Payload of a successful approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEdit {
    pub file_path: PathBuf,
    pub lines_before: usize,
    pub lines_after: usize,
    pub bytes_written: usize,
    pub byte_delta: i64,
    pub previous_version_token: VersionToken,
    pub new_version_token: VersionToken,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
}

/// Payload of a cancel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub removed: bool,
}

/// Payload of a list operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEditList {
    pub count: usize,
    pub pending_edits: Vec<PendingEditSummary>,
}

/// Payload of a version-token lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersion {
    pub path: PathBuf,
    pub version_token: VersionToken,
    pub size_bytes: u64,
    pub line_count: usize,
}

/// A single numbered line returned by a read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberedLine {
    pub number: usize,
    pub text: String,
}

/// Payload of a line read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLines {
    pub path: PathBuf,
    pub version_token: VersionToken,
    pub total_lines: usize,
    pub lines: Vec<NumberedLine>,
}

/// Structured failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for ErrorDetails {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<Error> for ErrorDetails {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Envelope returned by every service operation.
///
/// On success the payload's fields are flattened next to `success`; on
/// failure only `error` is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditResult<T> {
    pub success: bool,
    #[serde(flatten)]
    pub payload: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

impl<T> EditResult<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(err: &Error) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(ErrorDetails::from(err)),
        }
    }

    /// The single conversion point from a core `Result` to the envelope.
    pub fn from_result(result: crate::Result<T>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(e) => Self::err(&e),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Unwrap the envelope back into a `Result`.
    pub fn into_result(self) -> std::result::Result<T, ErrorDetails> {
        match (self.payload, self.error) {
            (Some(payload), None) => Ok(payload),
            (_, Some(error)) => Err(error),
            (None, None) => Err(ErrorDetails {
                kind: ErrorKind::InvalidInput,
                message: "empty result".to_string(),
            }),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Arguments for `prepare_replace_lines`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ReplaceLinesRequest {
    /// Path of the file to edit
    pub path: PathBuf,
    /// First line to replace (1-based)
    pub start_line: usize,
    /// Last line to replace (inclusive)
    pub end_line: usize,
    /// Replacement text; may span several lines or be empty
    pub new_content: String,
    /// Version token from get_version_token or read_file_lines; the edit is refused if the file changed since
    pub expected_version_token: VersionToken,
    /// Copy the file to a timestamped backup before writing (default false)
    #[serde(default)]
    pub backup: bool,
}

/// Arguments for `prepare_insert_after_line`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InsertAfterLineRequest {
    /// Path of the file to edit
    pub path: PathBuf,
    /// Line to insert after; 0 inserts before the first line
    pub after_line: usize,
    /// Text to insert
    pub content: String,
    /// Version token from get_version_token or read_file_lines; the edit is refused if the file changed since
    pub expected_version_token: VersionToken,
    /// Prefix inserted lines with the anchor line's indentation (default true)
    #[serde(default = "default_true")]
    pub maintain_indentation: bool,
    /// Copy the file to a timestamped backup before writing (default false)
    #[serde(default)]
    pub backup: bool,
}

/// Arguments for `prepare_delete_lines`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DeleteLinesRequest {
    /// Path of the file to edit
    pub path: PathBuf,
    /// First line to delete (1-based)
    pub start_line: usize,
    /// Last line to delete (inclusive)
    pub end_line: usize,
    /// Version token from get_version_token or read_file_lines; the edit is refused if the file changed since
    pub expected_version_token: VersionToken,
    /// Copy the file to a timestamped backup before writing (default false)
    #[serde(default)]
    pub backup: bool,
}

/// Arguments for `prepare_replace_in_file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ReplaceInFileRequest {
    /// Path of the file to edit
    pub path: PathBuf,
    /// Text to find, or a regex when use_regex is true
    pub search_pattern: String,
    /// Replacement; with use_regex, $1 and ${name} refer to capture groups
    pub replace_with: String,
    /// Version token from get_version_token or read_file_lines; the edit is refused if the file changed since
    pub expected_version_token: VersionToken,
    /// Match case exactly (default true)
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    /// Treat search_pattern as a regular expression (default false)
    #[serde(default)]
    pub use_regex: bool,
    /// Copy the file to a timestamped backup before writing (default false)
    #[serde(default)]
    pub backup: bool,
}

/// Arguments for `approve_edit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ApproveRequest {
    /// Token returned by a prepare_* tool
    pub approval_token: String,
    /// Must be exactly APPROVE
    pub confirmation: String,
}

/// Arguments for `cancel_edit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CancelRequest {
    /// Token returned by a prepare_* tool
    pub approval_token: String,
}

/// Arguments for `get_version_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PathRequest {
    /// Path of the file
    pub path: PathBuf,
}

/// Arguments for `read_file_lines`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ReadLinesRequest {
    /// Path of the file
    pub path: PathBuf,
    /// First line to return (default 1)
    #[serde(default)]
    pub start_line: Option<usize>,
    /// Last line to return (default: end of file)
    #[serde(default)]
    pub end_line: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_pending(now: DateTime<Utc>) -> PendingEdit {
        PendingEdit {
            approval_token: "edit-1".to_string(),
            file_path: PathBuf::from("/tmp/a.txt"),
            kind: EditKind::DeleteLines {
                start_line: 2,
                end_line: 3,
            },
            expected_version_token: VersionToken::new("12-abc"),
            created_at: now,
            expires_at: now + Duration::seconds(300),
            backup_requested: false,
        }
    }

    #[test]
    fn test_edit_kind_serializes_with_tag() {
        let kind = EditKind::InsertAfterLine {
            line: 4,
            text: "x".to_string(),
            maintain_indentation: true,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["kind"], "insert_after_line");
        assert_eq!(json["line"], 4);
    }

    #[test]
    fn test_edit_kind_display() {
        let kind = EditKind::ReplaceLines {
            start_line: 5,
            end_line: 7,
            new_text: String::new(),
        };
        assert_eq!(kind.to_string(), "replace lines 5-7");
        let kind = EditKind::ReplaceInFile {
            search_pattern: "fo+".to_string(),
            replacement: "bar".to_string(),
            case_sensitive: true,
            use_regex: true,
        };
        assert_eq!(kind.to_string(), "replace /fo+/");
    }

    #[test]
    fn test_pending_edit_expiry_boundary() {
        let now = Utc::now();
        let pending = sample_pending(now);
        assert!(!pending.is_expired(now + Duration::seconds(300)));
        assert!(pending.is_expired(now + Duration::seconds(301)));
    }

    #[test]
    fn test_summary_seconds_remaining_never_negative() {
        let now = Utc::now();
        let pending = sample_pending(now);
        assert_eq!(pending.summary(now).seconds_remaining, 300);
        assert_eq!(
            pending.summary(now + Duration::seconds(900)).seconds_remaining,
            0
        );
    }

    #[test]
    fn test_edit_result_flattens_payload() {
        let result = EditResult::ok(CancelOutcome { removed: true });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["removed"], true);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_edit_result_error_shape() {
        let result: EditResult<CancelOutcome> = EditResult::err(&Error::TokenExpiredOrInvalid);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "token_expired_or_invalid");
        assert!(json.get("removed").is_none());
        assert_eq!(result.error_kind(), Some(ErrorKind::TokenExpiredOrInvalid));

        let err = result.into_result().unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenExpiredOrInvalid);
        assert!(err.to_string().contains("Prepare the edit again"));
    }

    #[test]
    fn test_request_defaults() {
        let req: InsertAfterLineRequest = serde_json::from_value(serde_json::json!({
            "path": "/tmp/a.txt",
            "after_line": 0,
            "content": "x",
            "expected_version_token": "1-abc"
        }))
        .unwrap();
        assert!(req.maintain_indentation);
        assert!(!req.backup);

        let req: ReplaceInFileRequest = serde_json::from_value(serde_json::json!({
            "path": "/tmp/a.txt",
            "search_pattern": "foo",
            "replace_with": "bar",
            "expected_version_token": "1-abc"
        }))
        .unwrap();
        assert!(req.case_sensitive);
        assert!(!req.use_regex);
    }
}
