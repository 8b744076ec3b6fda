//! Edit committer.
//!
//! Applies a staged edit once the caller confirms it. A pending edit moves
//! from staged to exactly one of applied, cancelled or expired; the store
//! entry is taken out before the file is touched, so two approvals of the
//! same token can never both write.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::fileio;
use crate::models::{AppliedEdit, PendingEdit};
use crate::planner::{derive_content, ensure_version};
use crate::store::PendingEditStore;
use crate::version::compute_version_token;
use crate::{Error, Result};

/// The exact phrase a caller must pass to apply an edit.
pub const APPROVAL_PHRASE: &str = "APPROVE";

/// Default suffix appended to backup file names.
pub const DEFAULT_BACKUP_SUFFIX: &str = "bak";

/// Check the confirmation phrase. Comparison is exact and case-sensitive.
pub fn ensure_confirmed(confirmation: &str) -> Result<()> {
    if confirmation == APPROVAL_PHRASE {
        Ok(())
    } else {
        Err(Error::ConfirmationMismatch {
            expected: APPROVAL_PHRASE,
        })
    }
}

pub struct EditCommitter {
    store: Arc<PendingEditStore>,
    clock: Arc<dyn Clock>,
    backup_suffix: String,
}

impl EditCommitter {
    pub fn new(store: Arc<PendingEditStore>) -> Self {
        let clock = store.clock().clone();
        Self {
            store,
            clock,
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
        }
    }

    pub fn with_backup_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.backup_suffix = suffix.into();
        self
    }

    /// Apply the edit staged under `token`.
    ///
    /// A wrong confirmation leaves the entry untouched. A version conflict
    /// discards it. An IO failure puts it back so the caller can retry.
    pub fn apply(&self, token: &str, confirmation: &str) -> Result<AppliedEdit> {
        ensure_confirmed(confirmation)?;

        let pending = self
            .store
            .take(token)
            .ok_or(Error::TokenExpiredOrInvalid)?;

        match self.commit(&pending) {
            Ok(applied) => {
                info!(
                    token,
                    path = %applied.file_path.display(),
                    new_version = %applied.new_version_token,
                    "applied edit"
                );
                Ok(applied)
            }
            Err(Error::Io(e)) => {
                let restored = self.store.restore(pending);
                warn!(token, error = %e, restored, "edit failed to apply");
                Err(Error::Io(e))
            }
            Err(e) => {
                warn!(token, error = %e, "discarding pending edit");
                Err(e)
            }
        }
    }

    /// Remove a staged edit. Returns whether anything was removed.
    pub fn cancel(&self, token: &str) -> bool {
        let removed = self.store.cancel(token);
        if removed {
            info!(token, "cancelled edit");
        }
        removed
    }

    fn commit(&self, pending: &PendingEdit) -> Result<AppliedEdit> {
        let path = &pending.file_path;
        let expected = &pending.expected_version_token;

        ensure_version(path, expected, &compute_version_token(path)?)?;
        let text = fileio::read_text(path)?;
        ensure_version(path, expected, &compute_version_token(path)?)?;

        let derived = derive_content(&text, &pending.kind)?;
        let backup_path = self.write_checked(pending, &derived.new_text)?;

        let new_version_token = compute_version_token(path)?;
        Ok(AppliedEdit {
            file_path: path.clone(),
            lines_before: derived.lines_before,
            lines_after: derived.lines_after,
            bytes_written: derived.new_text.len(),
            byte_delta: derived.new_text.len() as i64 - text.len() as i64,
            previous_version_token: expected.clone(),
            new_version_token,
            backup_path,
        })
    }

    /// Final version check, then the optional backup, then the write.
    ///
    /// Nothing is created on disk when the file has drifted.
    fn write_checked(&self, pending: &PendingEdit, new_text: &str) -> Result<Option<PathBuf>> {
        let path = &pending.file_path;
        ensure_version(
            path,
            &pending.expected_version_token,
            &compute_version_token(path)?,
        )?;

        let backup_path = if pending.backup_requested {
            Some(fileio::create_backup(
                path,
                self.clock.now(),
                &self.backup_suffix,
            )?)
        } else {
            None
        };
        fileio::write_atomic(path, new_text)?;
        Ok(backup_path)
    }
}
