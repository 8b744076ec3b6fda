//! Command implementations for the `eg` CLI.
//!
//! Each command drives an `EditService` and returns a payload that can be
//! printed as JSON or formatted for humans.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{ConfigEntry, ResolvedConfig};
use crate::models::{
    AppliedEdit, ApproveRequest, DeleteLinesRequest, ErrorDetails, FileLines, FileVersion,
    InsertAfterLineRequest, PathRequest, PreparedEdit, ReadLinesRequest, ReplaceInFileRequest,
    ReplaceLinesRequest, VersionToken,
};
use crate::service::EditService;

/// Result of a CLI command; failures carry the structured error.
pub type CommandResult<T> = std::result::Result<T, ErrorDetails>;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

impl Output for PreparedEdit {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let p = &self.preview;
        let mut out = self.preview.diff.clone();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&format!(
            "{}: -{} +{} lines ({} -> {} lines, {:+} bytes)\n",
            self.file_path.display(),
            p.lines_removed,
            p.lines_added,
            p.total_lines_before,
            p.total_lines_after,
            p.byte_delta
        ));
        if let Some(count) = self.match_count {
            out.push_str(&format!("matches: {}\n", count));
        }
        for warning in &self.warnings {
            out.push_str(&format!("warning: {}\n", warning));
        }
        out.push_str(&format!(
            "approval token: {} (expires {})",
            self.approval_token,
            self.expires_at.format("%H:%M:%S UTC")
        ));
        out
    }
}

impl Output for AppliedEdit {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!(
            "Applied edit to {} ({} -> {} lines, {} bytes written)\nnew version: {}",
            self.file_path.display(),
            self.lines_before,
            self.lines_after,
            self.bytes_written,
            self.new_version_token
        );
        if let Some(ref backup) = self.backup_path {
            out.push_str(&format!("\nbackup: {}", backup.display()));
        }
        out
    }
}

impl Output for FileVersion {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "{}  {} ({} bytes, {} lines)",
            self.version_token,
            self.path.display(),
            self.size_bytes,
            self.line_count
        )
    }
}

impl Output for FileLines {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let width = self.total_lines.max(1).to_string().len();
        let mut out = format!(
            "{} ({} lines, version {})",
            self.path.display(),
            self.total_lines,
            self.version_token
        );
        for line in &self.lines {
            out.push_str(&format!("\n{:>width$}  {}", line.number, line.text, width = width));
        }
        out
    }
}

/// Output of `eg config show`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    pub settings: Vec<ConfigEntry>,
}

impl Output for ConfigView {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let width = self.settings.iter().map(|e| e.key.len()).max().unwrap_or(0);
        self.settings
            .iter()
            .map(|e| {
                format!(
                    "{:<width$}  {}  ({})",
                    e.key,
                    e.value,
                    e.source,
                    width = width
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A structural edit as requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    ReplaceLines {
        start: usize,
        end: usize,
        content: String,
    },
    InsertAfter {
        line: usize,
        content: String,
        maintain_indentation: bool,
    },
    DeleteLines {
        start: usize,
        end: usize,
    },
    ReplaceInFile {
        pattern: String,
        replacement: String,
        case_sensitive: bool,
        use_regex: bool,
    },
}

/// `eg version-token <path>`
pub fn version_token(svc: &EditService, path: &Path) -> CommandResult<FileVersion> {
    svc.get_version_token(PathRequest {
        path: path.to_path_buf(),
    })
    .into_result()
}

/// `eg read <path>`
pub fn read(
    svc: &EditService,
    path: &Path,
    start: Option<usize>,
    end: Option<usize>,
) -> CommandResult<FileLines> {
    svc.read_file_lines(ReadLinesRequest {
        path: path.to_path_buf(),
        start_line: start,
        end_line: end,
    })
    .into_result()
}

/// Stage `op` against `path`.
///
/// Without `expect` the file's current version token is used, which makes
/// the edit unconditional on what was on disk at the time of the call.
pub fn prepare_edit(
    svc: &EditService,
    path: &Path,
    op: EditOp,
    expect: Option<String>,
    backup: bool,
) -> CommandResult<PreparedEdit> {
    let expected_version_token = match expect {
        Some(token) => VersionToken::new(token),
        None => version_token(svc, path)?.version_token,
    };
    let path: PathBuf = path.to_path_buf();

    let result = match op {
        EditOp::ReplaceLines {
            start,
            end,
            content,
        } => svc.prepare_replace_lines(ReplaceLinesRequest {
            path,
            start_line: start,
            end_line: end,
            new_content: content,
            expected_version_token,
            backup,
        }),
        EditOp::InsertAfter {
            line,
            content,
            maintain_indentation,
        } => svc.prepare_insert_after_line(InsertAfterLineRequest {
            path,
            after_line: line,
            content,
            expected_version_token,
            maintain_indentation,
            backup,
        }),
        EditOp::DeleteLines { start, end } => svc.prepare_delete_lines(DeleteLinesRequest {
            path,
            start_line: start,
            end_line: end,
            expected_version_token,
            backup,
        }),
        EditOp::ReplaceInFile {
            pattern,
            replacement,
            case_sensitive,
            use_regex,
        } => svc.prepare_replace_in_file(ReplaceInFileRequest {
            path,
            search_pattern: pattern,
            replace_with: replacement,
            expected_version_token,
            case_sensitive,
            use_regex,
            backup,
        }),
    };
    result.into_result()
}

/// Apply a staged edit.
pub fn approve(
    svc: &EditService,
    approval_token: &str,
    confirmation: &str,
) -> CommandResult<AppliedEdit> {
    svc.approve_edit(ApproveRequest {
        approval_token: approval_token.to_string(),
        confirmation: confirmation.to_string(),
    })
    .into_result()
}

/// `eg config show`
pub fn config_show(config: &ResolvedConfig) -> ConfigView {
    ConfigView {
        settings: config.entries(),
    }
}
