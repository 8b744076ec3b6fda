//! Edit planner.
//!
//! Turns a structural edit request plus a version-token precondition into a
//! staged `PendingEdit` and a reviewable preview. Planning reads the target
//! file but never writes it.

use regex::{NoExpand, Regex, RegexBuilder};
use similar::{ChangeTag, TextDiff};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::fileio;
use crate::lines::{LineBuffer, apply_indentation, split_content};
use crate::models::{
    DeleteLinesRequest, EditKind, EditPlan, EditPreview, InsertAfterLineRequest, PreparedEdit,
    ReplaceInFileRequest, ReplaceLinesRequest, VersionToken,
};
use crate::store::PendingEditStore;
use crate::version::compute_version_token;
use crate::{Error, Result};

/// Default cap on the number of diff lines included in a preview.
pub const DEFAULT_PREVIEW_MAX_LINES: usize = 200;

/// Diff context lines around each change.
const DIFF_CONTEXT: usize = 3;

/// The result of applying an `EditKind` to file text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derived {
    pub new_text: String,
    pub lines_before: usize,
    pub lines_after: usize,
    pub lines_removed: usize,
    pub lines_added: usize,
    /// Pattern matches (replace-in-file only)
    pub match_count: Option<usize>,
}

/// Compute the content `kind` produces from `text`.
///
/// Used both when planning and when re-deriving at apply time, so a plan and
/// its commit always agree on the result for the same input.
pub fn derive_content(text: &str, kind: &EditKind) -> Result<Derived> {
    match kind {
        EditKind::ReplaceLines {
            start_line,
            end_line,
            new_text,
        } => {
            let mut buf = LineBuffer::parse(text);
            let before = buf.len();
            check_span(*start_line, *end_line, before)?;
            let replacement = split_content(new_text);
            let added = replacement.len();
            buf.splice(*start_line, *end_line, replacement);
            Ok(Derived {
                new_text: buf.render(),
                lines_before: before,
                lines_after: buf.len(),
                lines_removed: end_line - start_line + 1,
                lines_added: added,
                match_count: None,
            })
        }
        EditKind::InsertAfterLine {
            line,
            text: content,
            maintain_indentation,
        } => {
            let mut buf = LineBuffer::parse(text);
            let before = buf.len();
            if *line > before {
                return Err(Error::InvalidRange(format!(
                    "after_line {} is outside 0..={} for a file of {} lines",
                    line, before, before
                )));
            }
            let mut new_lines = split_content(content);
            if *maintain_indentation {
                let indent = buf.indentation_at(*line);
                new_lines = apply_indentation(new_lines, &indent);
            }
            let added = new_lines.len();
            buf.insert_after(*line, new_lines);
            Ok(Derived {
                new_text: buf.render(),
                lines_before: before,
                lines_after: buf.len(),
                lines_removed: 0,
                lines_added: added,
                match_count: None,
            })
        }
        EditKind::DeleteLines {
            start_line,
            end_line,
        } => {
            let mut buf = LineBuffer::parse(text);
            let before = buf.len();
            check_span(*start_line, *end_line, before)?;
            buf.splice(*start_line, *end_line, Vec::new());
            Ok(Derived {
                new_text: buf.render(),
                lines_before: before,
                lines_after: buf.len(),
                lines_removed: end_line - start_line + 1,
                lines_added: 0,
                match_count: None,
            })
        }
        EditKind::ReplaceInFile {
            search_pattern,
            replacement,
            case_sensitive,
            use_regex,
        } => {
            let re = build_pattern(search_pattern, *case_sensitive, *use_regex)?;
            let count = re.find_iter(text).count();
            let new_text = if *use_regex {
                re.replace_all(text, replacement.as_str()).into_owned()
            } else {
                re.replace_all(text, NoExpand(replacement.as_str())).into_owned()
            };
            let (removed, added) = count_changed_lines(text, &new_text);
            Ok(Derived {
                lines_before: LineBuffer::parse(text).len(),
                lines_after: LineBuffer::parse(&new_text).len(),
                new_text,
                lines_removed: removed,
                lines_added: added,
                match_count: Some(count),
            })
        }
    }
}

fn check_span(start: usize, end: usize, total: usize) -> Result<()> {
    if start < 1 {
        return Err(Error::InvalidRange(format!(
            "start_line must be at least 1, got {}",
            start
        )));
    }
    if end < start {
        return Err(Error::InvalidRange(format!(
            "end_line {} is before start_line {}",
            end, start
        )));
    }
    if end > total {
        return Err(Error::InvalidRange(format!(
            "end_line {} is past the end of a file of {} lines",
            end, total
        )));
    }
    Ok(())
}

fn build_pattern(pattern: &str, case_sensitive: bool, use_regex: bool) -> Result<Regex> {
    if pattern.is_empty() {
        return Err(Error::InvalidPattern(
            "search pattern must not be empty".to_string(),
        ));
    }
    let source = if use_regex {
        pattern.to_string()
    } else {
        regex::escape(pattern)
    };
    RegexBuilder::new(&source)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| Error::InvalidPattern(e.to_string()))
}

fn count_changed_lines(old: &str, new: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(old, new);
    let mut removed = 0;
    let mut added = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => removed += 1,
            ChangeTag::Insert => added += 1,
            ChangeTag::Equal => {}
        }
    }
    (removed, added)
}

/// Unified diff of `old` → `new`, capped at `max_lines` lines.
pub fn render_diff(path: &Path, old: &str, new: &str, max_lines: usize) -> String {
    let name = path.display().to_string();
    let diff = TextDiff::from_lines(old, new);
    let unified = diff
        .unified_diff()
        .context_radius(DIFF_CONTEXT)
        .header(&name, &name)
        .to_string();

    let total = unified.lines().count();
    if total <= max_lines {
        return unified;
    }
    let mut out: String = unified
        .lines()
        .take(max_lines)
        .map(|l| format!("{}\n", l))
        .collect();
    out.push_str(&format!("... ({} more diff lines)\n", total - max_lines));
    out
}

/// Plans edits and stages them in the shared store.
pub struct EditPlanner {
    store: Arc<PendingEditStore>,
    preview_max_lines: usize,
}

impl EditPlanner {
    pub fn new(store: Arc<PendingEditStore>) -> Self {
        Self {
            store,
            preview_max_lines: DEFAULT_PREVIEW_MAX_LINES,
        }
    }

    pub fn with_preview_max_lines(mut self, max: usize) -> Self {
        self.preview_max_lines = max;
        self
    }

    pub fn prepare_replace_lines(&self, req: ReplaceLinesRequest) -> Result<PreparedEdit> {
        self.prepare(
            &req.path,
            EditKind::ReplaceLines {
                start_line: req.start_line,
                end_line: req.end_line,
                new_text: req.new_content,
            },
            req.expected_version_token,
            req.backup,
        )
    }

    pub fn prepare_insert_after_line(&self, req: InsertAfterLineRequest) -> Result<PreparedEdit> {
        self.prepare(
            &req.path,
            EditKind::InsertAfterLine {
                line: req.after_line,
                text: req.content,
                maintain_indentation: req.maintain_indentation,
            },
            req.expected_version_token,
            req.backup,
        )
    }

    pub fn prepare_delete_lines(&self, req: DeleteLinesRequest) -> Result<PreparedEdit> {
        self.prepare(
            &req.path,
            EditKind::DeleteLines {
                start_line: req.start_line,
                end_line: req.end_line,
            },
            req.expected_version_token,
            req.backup,
        )
    }

    pub fn prepare_replace_in_file(&self, req: ReplaceInFileRequest) -> Result<PreparedEdit> {
        self.prepare(
            &req.path,
            EditKind::ReplaceInFile {
                search_pattern: req.search_pattern,
                replacement: req.replace_with,
                case_sensitive: req.case_sensitive,
                use_regex: req.use_regex,
            },
            req.expected_version_token,
            req.backup,
        )
    }

    fn prepare(
        &self,
        path: &Path,
        kind: EditKind,
        expected: VersionToken,
        backup: bool,
    ) -> Result<PreparedEdit> {
        let file_path = resolve_path(path)?;
        let current = compute_version_token(&file_path)?;
        ensure_version(&file_path, &expected, &current)?;
        let text = fileio::read_text(&file_path)?;
        // The plan must describe the version it was checked against.
        ensure_version(&file_path, &expected, &compute_version_token(&file_path)?)?;

        let derived = derive_content(&text, &kind)?;
        debug!(
            path = %file_path.display(),
            edit = %kind,
            removed = derived.lines_removed,
            added = derived.lines_added,
            "planned edit"
        );

        let mut warnings = Vec::new();
        if derived.match_count == Some(0) {
            warnings.push(
                "Pattern matched nothing; approving this edit rewrites the file unchanged"
                    .to_string(),
            );
        }

        let preview = EditPreview {
            lines_removed: derived.lines_removed,
            lines_added: derived.lines_added,
            total_lines_before: derived.lines_before,
            total_lines_after: derived.lines_after,
            bytes_before: text.len(),
            bytes_after: derived.new_text.len(),
            byte_delta: derived.new_text.len() as i64 - text.len() as i64,
            diff: render_diff(&file_path, &text, &derived.new_text, self.preview_max_lines),
        };

        let pending = self.store.stage(EditPlan {
            file_path,
            kind,
            expected_version_token: current,
            backup_requested: backup,
        });
        info!(
            token = %pending.approval_token,
            path = %pending.file_path.display(),
            edit = %pending.kind,
            "staged edit"
        );

        Ok(PreparedEdit {
            approval_token: pending.approval_token,
            file_path: pending.file_path,
            expected_version_token: pending.expected_version_token,
            expires_at: pending.expires_at,
            preview,
            match_count: derived.match_count,
            warnings,
        })
    }
}

/// Fail with `VersionConflict` unless `actual` matches `expected`.
pub fn ensure_version(path: &Path, expected: &VersionToken, actual: &VersionToken) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    Err(Error::VersionConflict {
        path: path.to_path_buf(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

/// Canonicalize a caller-supplied path, mapping a missing file to `NotFound`.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|e| Error::from_io(e, path))
}
