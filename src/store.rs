//! Pending edit store.
//!
//! Holds planned-but-unapplied edits keyed by approval token. Entries
//! expire a fixed time after staging; expiry is enforced lazily, so an
//! expired entry is removed the next time it (or the whole store) is
//! looked at, and is never returned.

use chrono::Duration;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::clock::Clock;
use crate::models::{EditPlan, PendingEdit};

/// Default time a staged edit stays approvable.
pub const DEFAULT_TTL_SECS: i64 = 300;

/// Source of approval tokens.
pub trait TokenSource: Send + Sync {
    fn next_token(&self) -> String;
}

/// Random tokens: `edit-` followed by a v4 UUID (122 random bits).
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTokens;

impl TokenSource for UuidTokens {
    fn next_token(&self) -> String {
        format!("edit-{}", uuid::Uuid::new_v4().simple())
    }
}

/// Deterministic tokens (`edit-0001`, `edit-0002`, ...) for tests.
#[derive(Debug, Default)]
pub struct SequentialTokens {
    next: AtomicU64,
}

impl TokenSource for SequentialTokens {
    fn next_token(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("edit-{:04}", n)
    }
}

/// Thread-safe map from approval token to pending edit.
pub struct PendingEditStore {
    entries: Mutex<HashMap<String, PendingEdit>>,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenSource>,
    ttl: Duration,
}

impl PendingEditStore {
    /// Create a store with the default TTL.
    pub fn new(clock: Arc<dyn Clock>, tokens: Arc<dyn TokenSource>) -> Self {
        Self::with_ttl(clock, tokens, Duration::seconds(DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, tokens: Arc<dyn TokenSource>, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            tokens,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Stage a plan under a fresh approval token.
    pub fn stage(&self, plan: EditPlan) -> PendingEdit {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let mut token = self.tokens.next_token();
        while entries.contains_key(&token) {
            token = self.tokens.next_token();
        }

        let pending = PendingEdit {
            approval_token: token.clone(),
            file_path: plan.file_path,
            kind: plan.kind,
            expected_version_token: plan.expected_version_token,
            created_at: now,
            expires_at: now + self.ttl,
            backup_requested: plan.backup_requested,
        };
        entries.insert(token, pending.clone());
        debug!(token = %pending.approval_token, path = %pending.file_path.display(), "staged pending edit");
        pending
    }

    /// Look up a live entry, dropping it if it has expired.
    pub fn lookup(&self, token: &str) -> Option<PendingEdit> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(token) {
            Some(pending) if pending.is_expired(now) => {
                entries.remove(token);
                debug!(token, "pending edit expired on lookup");
                None
            }
            Some(pending) => Some(pending.clone()),
            None => None,
        }
    }

    /// Remove and return a live entry in one step.
    ///
    /// Only one of several concurrent callers can take a given token.
    pub fn take(&self, token: &str) -> Option<PendingEdit> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let pending = entries.remove(token)?;
        if pending.is_expired(now) {
            debug!(token, "pending edit expired on take");
            return None;
        }
        Some(pending)
    }

    /// Put back an entry previously taken, unless it has expired meanwhile
    /// or its token has been reused.
    pub fn restore(&self, pending: PendingEdit) -> bool {
        if pending.is_expired(self.clock.now()) {
            return false;
        }
        let mut entries = self.entries.lock();
        if entries.contains_key(&pending.approval_token) {
            return false;
        }
        entries.insert(pending.approval_token.clone(), pending);
        true
    }

    /// Remove an entry. Returns whether a live entry was removed.
    pub fn cancel(&self, token: &str) -> bool {
        self.take(token).is_some()
    }

    /// All live entries, oldest first.
    pub fn list_all(&self) -> Vec<PendingEdit> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        entries.retain(|_, pending| !pending.is_expired(now));
        let mut live: Vec<PendingEdit> = entries.values().cloned().collect();
        live.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.approval_token.cmp(&b.approval_token))
        });
        live
    }

    /// Drop every expired entry and return how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, pending| !pending.is_expired(now));
        before - entries.len()
    }

    /// Number of entries currently held, including any not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for PendingEditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingEditStore")
            .field("entries", &self.len())
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish()
    }
}
