//! Dual-completion tracker for in-flight paired query sessions.
//!
//! One entry exists per `locked` hash. It records which of the two paired
//! queries has finished; the gate consumes the hash once both have.

use crate::ledger::NormalizedHash;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One of the two paired queries of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubPath {
    /// The transaction list query.
    First,
    /// The token-transfer list query.
    Second,
}

/// Completion flags for one locked hash.
#[derive(Debug, Clone, Copy)]
pub struct CompletionStatus {
    /// The first paired query finished.
    pub first_done: bool,
    /// The second paired query finished.
    pub second_done: bool,
    /// When the session was opened.
    pub started_at: Instant,
}

impl CompletionStatus {
    fn new() -> Self {
        Self {
            first_done: false,
            second_done: false,
            started_at: Instant::now(),
        }
    }

    /// True once both paired queries have finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.first_done && self.second_done
    }
}

/// Transient map of in-flight sessions. Safe to lose on restart.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    inner: Mutex<HashMap<NormalizedHash, CompletionStatus>>,
}

impl CompletionTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session with both flags cleared, replacing any previous one.
    pub fn start(&self, hash: &NormalizedHash) {
        self.inner.lock().insert(hash.clone(), CompletionStatus::new());
    }

    /// True when a session is open for `hash`.
    #[must_use]
    pub fn contains(&self, hash: &NormalizedHash) -> bool {
        self.inner.lock().contains_key(hash)
    }

    /// Current flags for `hash`.
    #[must_use]
    pub fn get(&self, hash: &NormalizedHash) -> Option<CompletionStatus> {
        self.inner.lock().get(hash).copied()
    }

    /// Set the flag for `which`. Returns whether both flags are now set,
    /// or `None` when no session is open. Marking the same path twice does
    /// not count as the other path.
    pub fn mark(&self, hash: &NormalizedHash, which: SubPath) -> Option<bool> {
        let mut inner = self.inner.lock();
        let status = inner.get_mut(hash)?;
        match which {
            SubPath::First => status.first_done = true,
            SubPath::Second => status.second_done = true,
        }
        Some(status.is_complete())
    }

    /// Close the session for `hash`.
    pub fn remove(&self, hash: &NormalizedHash) -> Option<CompletionStatus> {
        self.inner.lock().remove(hash)
    }

    /// Hashes whose session has been open longer than `max_age`.
    #[must_use]
    pub fn stale(&self, max_age: Duration) -> Vec<NormalizedHash> {
        self.inner
            .lock()
            .iter()
            .filter(|(_, status)| status.started_at.elapsed() > max_age)
            .map(|(hash, _)| hash.clone())
            .collect()
    }

    /// Number of open sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True when no session is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
