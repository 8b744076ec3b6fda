//! Service facade over the edit protocol.
//!
//! `EditService` is what transports talk to. Every operation checks the
//! path gate, runs the core, records an action log entry and returns an
//! `EditResult` envelope; nothing here returns a bare error or panics.

use chrono::Duration;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::action_log::ActionLogger;
use crate::clock::SystemClock;
use crate::committer::EditCommitter;
use crate::config::ResolvedConfig;
use crate::fileio;
use crate::gate::{AllowedRoots, PathGate};
use crate::lines::LineBuffer;
use crate::models::{
    AppliedEdit, ApproveRequest, CancelOutcome, CancelRequest, DeleteLinesRequest, EditResult,
    FileLines, FileVersion, InsertAfterLineRequest, NumberedLine, PathRequest, PendingEditList,
    PreparedEdit, ReadLinesRequest, ReplaceInFileRequest, ReplaceLinesRequest, VersionToken,
};
use crate::planner::{EditPlanner, resolve_path};
use crate::store::{PendingEditStore, UuidTokens};
use crate::version::compute_version_token;
use crate::{Error, Result};

/// Upper bound on the configured TTL (one year).
const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Attempts at reading a file while it is not being written.
const SNAPSHOT_ATTEMPTS: usize = 3;

pub struct EditService {
    store: Arc<PendingEditStore>,
    planner: EditPlanner,
    committer: EditCommitter,
    gate: Arc<dyn PathGate>,
    log: ActionLogger,
}

impl EditService {
    pub fn new(store: Arc<PendingEditStore>, gate: Arc<dyn PathGate>) -> Self {
        Self {
            planner: EditPlanner::new(store.clone()),
            committer: EditCommitter::new(store.clone()),
            store,
            gate,
            log: ActionLogger::disabled(),
        }
    }

    /// Build a service with the system clock and random approval tokens.
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let ttl_secs = config.pending_ttl_secs.value.clamp(1, MAX_TTL_SECS) as i64;
        let store = Arc::new(PendingEditStore::with_ttl(
            Arc::new(SystemClock),
            Arc::new(UuidTokens),
            Duration::seconds(ttl_secs),
        ));
        let gate = Arc::new(AllowedRoots::new(config.allowed_roots.value.clone()));

        Self::new(store, gate)
            .with_preview_max_lines(config.preview_max_lines.value)
            .with_backup_suffix(config.backup_suffix.value.clone())
            .with_action_log(ActionLogger::new(config.action_log().map(Path::to_path_buf)))
    }

    pub fn with_preview_max_lines(mut self, max: usize) -> Self {
        self.planner = self.planner.with_preview_max_lines(max);
        self
    }

    pub fn with_backup_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.committer = self.committer.with_backup_suffix(suffix);
        self
    }

    pub fn with_action_log(mut self, log: ActionLogger) -> Self {
        self.log = log;
        self
    }

    pub fn store(&self) -> &Arc<PendingEditStore> {
        &self.store
    }

    pub fn prepare_replace_lines(&self, req: ReplaceLinesRequest) -> EditResult<PreparedEdit> {
        self.run("prepare_replace_lines", &req, || {
            self.gate.check(&req.path)?;
            self.planner.prepare_replace_lines(req.clone())
        })
    }

    pub fn prepare_insert_after_line(
        &self,
        req: InsertAfterLineRequest,
    ) -> EditResult<PreparedEdit> {
        self.run("prepare_insert_after_line", &req, || {
            self.gate.check(&req.path)?;
            self.planner.prepare_insert_after_line(req.clone())
        })
    }

    pub fn prepare_delete_lines(&self, req: DeleteLinesRequest) -> EditResult<PreparedEdit> {
        self.run("prepare_delete_lines", &req, || {
            self.gate.check(&req.path)?;
            self.planner.prepare_delete_lines(req.clone())
        })
    }

    pub fn prepare_replace_in_file(&self, req: ReplaceInFileRequest) -> EditResult<PreparedEdit> {
        self.run("prepare_replace_in_file", &req, || {
            self.gate.check(&req.path)?;
            self.planner.prepare_replace_in_file(req.clone())
        })
    }

    pub fn approve_edit(&self, req: ApproveRequest) -> EditResult<AppliedEdit> {
        self.run("approve_edit", &req, || {
            // The roots may have changed since the edit was staged.
            if let Some(pending) = self.store.lookup(&req.approval_token) {
                self.gate.check(&pending.file_path)?;
            }
            self.committer.apply(&req.approval_token, &req.confirmation)
        })
    }

    pub fn cancel_edit(&self, req: CancelRequest) -> EditResult<CancelOutcome> {
        self.run("cancel_edit", &req, || {
            Ok(CancelOutcome {
                removed: self.committer.cancel(&req.approval_token),
            })
        })
    }

    pub fn list_pending_edits(&self) -> EditResult<PendingEditList> {
        self.run("list_pending_edits", &serde_json::json!({}), || {
            let now = self.store.clock().now();
            let pending_edits: Vec<_> = self
                .store
                .list_all()
                .iter()
                .map(|p| p.summary(now))
                .collect();
            Ok(PendingEditList {
                count: pending_edits.len(),
                pending_edits,
            })
        })
    }

    pub fn get_version_token(&self, req: PathRequest) -> EditResult<FileVersion> {
        self.run("get_version_token", &req, || {
            self.gate.check(&req.path)?;
            let path = resolve_path(&req.path)?;
            let (text, version_token) = read_snapshot(&path)?;
            Ok(FileVersion {
                size_bytes: text.len() as u64,
                line_count: LineBuffer::parse(&text).len(),
                path,
                version_token,
            })
        })
    }

    pub fn read_file_lines(&self, req: ReadLinesRequest) -> EditResult<FileLines> {
        self.run("read_file_lines", &req, || {
            self.gate.check(&req.path)?;
            let path = resolve_path(&req.path)?;
            let (text, version_token) = read_snapshot(&path)?;
            let buf = LineBuffer::parse(&text);
            let (start, end) = read_window(req.start_line, req.end_line, buf.len())?;
            let lines = (start..=end)
                .filter_map(|n| {
                    buf.line(n).map(|text| NumberedLine {
                        number: n,
                        text: text.to_string(),
                    })
                })
                .collect();
            Ok(FileLines {
                path,
                version_token,
                total_lines: buf.len(),
                lines,
            })
        })
    }

    fn run<T, A: Serialize>(
        &self,
        operation: &str,
        args: &A,
        f: impl FnOnce() -> Result<T>,
    ) -> EditResult<T> {
        let started = Instant::now();
        let result = f();
        let duration_ms = started.elapsed().as_millis() as u64;

        let args = serde_json::to_value(args).unwrap_or(serde_json::Value::Null);
        match &result {
            Ok(_) => {
                debug!(operation, duration_ms, "operation succeeded");
                self.log.record(operation, &args, true, None, duration_ms);
            }
            Err(e) => {
                debug!(operation, duration_ms, error = %e, "operation failed");
                self.log.record(
                    operation,
                    &args,
                    false,
                    Some((e.kind().as_str(), e.to_string())),
                    duration_ms,
                );
            }
        }
        EditResult::from_result(result)
    }
}

/// Read `path` together with a version token describing exactly that content.
fn read_snapshot(path: &Path) -> Result<(String, VersionToken)> {
    let mut before = compute_version_token(path)?;
    for _ in 0..SNAPSHOT_ATTEMPTS {
        let text = fileio::read_text(path)?;
        let after = compute_version_token(path)?;
        if after == before {
            return Ok((text, after));
        }
        before = after;
    }
    Err(Error::Io(std::io::Error::other(format!(
        "{} kept changing while being read",
        path.display()
    ))))
}

/// Resolve an optional 1-based window over `total` lines.
///
/// A missing end reads to the end of the file and an end past the file is
/// clamped. A start past the file is an error, except that an empty file
/// can be read from line 1.
fn read_window(start: Option<usize>, end: Option<usize>, total: usize) -> Result<(usize, usize)> {
    let start = start.unwrap_or(1);
    if start == 0 {
        return Err(Error::InvalidRange(
            "start_line must be at least 1".to_string(),
        ));
    }
    if let Some(end) = end {
        if end < start {
            return Err(Error::InvalidRange(format!(
                "end_line {} is before start_line {}",
                end, start
            )));
        }
    }
    if start > total.max(1) {
        return Err(Error::InvalidRange(format!(
            "start_line {} is past the end of a file of {} lines",
            start, total
        )));
    }
    Ok((start, end.unwrap_or(total).min(total)))
}

impl std::fmt::Debug for EditService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditService")
            .field("store", &self.store)
            .field("action_log", &self.log.path().map(PathBuf::from))
            .finish()
    }
}
