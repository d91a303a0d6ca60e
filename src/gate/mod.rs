//! Verification gate: the proof-of-burn lifecycle state machine.
//!
//! A verified burn proof buys exactly one query session made of two paired
//! calls (transaction list + token-transfer list). The gate locks the hash
//! while the session is in flight, consumes it once both calls finish and
//! releases it again if either call fails.
//!
//! # State machine
//!
//! ```text
//!   (absent) ──add_verified_hash──▶ verified
//!                                     │  ▲
//!                  begin_gated_op     │  │ cancel_gated_op
//!                                     ▼  │
//!                                   locked ──mark(first)+mark(second)──▶ used
//! ```
//!
//! `used` is terminal. Every transition for one hash runs under that hash's
//! lock; different hashes proceed in parallel.

mod locks;
mod tracker;

pub use tracker::{CompletionStatus, CompletionTracker, SubPath};

use crate::event::{emit, GatewayEvent, GatewayEventsSender};
use crate::ledger::{HashStatus, HashStore, LedgerEntry, LedgerError, NormalizedHash};
use chrono::Utc;
use locks::HashLocks;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reasons the gate rejects an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// The hash has no ledger entry.
    #[error("hash {0} is not verified, please verify a burn transaction first")]
    NotVerified(NormalizedHash),

    /// The hash reached the terminal `used` state.
    #[error("hash {0} has already been used, please verify a new burn transaction")]
    AlreadyUsed(NormalizedHash),

    /// The hash is locked but no session is tracked for it.
    #[error("hash {0} is currently being processed, please retry shortly")]
    InFlight(NormalizedHash),

    /// The supplied hash was empty.
    #[error("transaction hash must not be empty")]
    EmptyHash,
}

/// Observable status of a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    /// No ledger entry.
    Unknown,
    /// Verified and available.
    Verified,
    /// A paired query session is in flight.
    Locked,
    /// Consumed.
    Used,
}

impl From<HashStatus> for TokenStatus {
    fn from(status: HashStatus) -> Self {
        match status {
            HashStatus::Verified => Self::Verified,
            HashStatus::Locked => Self::Locked,
            HashStatus::Used => Self::Used,
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Verified => "verified",
            Self::Locked => "locked",
            Self::Used => "used",
        })
    }
}

/// How `begin_gated_operation` admitted the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// The hash moved `verified → locked` and a session was opened.
    Locked,
    /// The hash was already locked with an open session; the caller joins it.
    Joined,
}

/// Result of `mark_sub_path`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Recorded; waiting for the other paired call.
    Pending,
    /// Both calls finished; the hash is now `used`.
    Consumed,
    /// No session was open for the hash.
    NotTracked,
}

/// The verification gate.
pub struct VerificationGate {
    store: Arc<dyn HashStore>,
    tracker: CompletionTracker,
    locks: HashLocks,
    events: Option<GatewayEventsSender>,
}

impl VerificationGate {
    /// Create a gate over the given ledger store.
    #[must_use]
    pub fn new(store: Arc<dyn HashStore>) -> Self {
        Self {
            store,
            tracker: CompletionTracker::new(),
            locks: HashLocks::default(),
            events: None,
        }
    }

    /// Emit lifecycle events on `events`.
    #[must_use]
    pub fn with_events(mut self, events: GatewayEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    /// True iff a ledger entry exists, whatever its state.
    #[must_use]
    pub fn is_verified(&self, hash: &str) -> bool {
        self.store.entry(&NormalizedHash::new(hash)).is_some()
    }

    /// True iff the used-hash index holds the hash or its entry is `used`.
    #[must_use]
    pub fn is_used(&self, hash: &str) -> bool {
        self.is_used_normalized(&NormalizedHash::new(hash))
    }

    /// Current status of a hash.
    ///
    /// A hash whose ledger entry was pruned but which is still in the
    /// used-hash index reports `Used`.
    #[must_use]
    pub fn status(&self, hash: &str) -> TokenStatus {
        let key = NormalizedHash::new(hash);
        match self.store.entry(&key) {
            Some(entry) => entry.status.into(),
            None if self.store.used_at(&key).is_some() => TokenStatus::Used,
            None => TokenStatus::Unknown,
        }
    }

    /// Full ledger record of a hash.
    #[must_use]
    pub fn details(&self, hash: &str) -> Option<LedgerEntry> {
        self.store.entry(&NormalizedHash::new(hash))
    }

    /// Open-session flags for a hash.
    #[must_use]
    pub fn completion(&self, hash: &str) -> Option<CompletionStatus> {
        self.tracker.get(&NormalizedHash::new(hash))
    }

    /// Record a successfully checked burn proof as `verified`.
    ///
    /// An existing unused entry is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyUsed` if the hash was consumed before, `EmptyHash` for
    /// an empty hash.
    pub fn add_verified_hash(&self, hash: &str, owner: &str) -> Result<(), GateError> {
        let key = NormalizedHash::new(hash);
        if key.is_empty() {
            return Err(GateError::EmptyHash);
        }

        let slot = self.locks.slot(&key);
        let _guard = slot.lock();

        if self.is_used_normalized(&key) {
            return Err(GateError::AlreadyUsed(key));
        }
        if let Some(existing) = self.store.entry(&key) {
            debug!("Hash {key} already verified ({}), keeping entry", existing.status);
            return Ok(());
        }

        if let Err(e) = self.store.insert(&key, LedgerEntry::verified(owner)) {
            warn!("Failed to persist verified hash {key}: {e}");
        }
        info!("Recorded verified hash {key} from {owner}");
        emit(
            self.events.as_ref(),
            GatewayEvent::HashVerified {
                hash: key.to_string(),
            },
        );
        Ok(())
    }

    /// Admit a caller into the paired query session for `hash`.
    ///
    /// - `verified` → locks the hash and opens a session
    /// - `locked` with an open session → lets the second paired call through
    /// - `locked` without a session → `InFlight`
    /// - `used` → `AlreadyUsed`, nothing is mutated
    /// - unknown → `NotVerified`
    ///
    /// # Errors
    ///
    /// Returns the [`GateError`] matching the rejection above.
    pub fn begin_gated_operation(&self, hash: &str) -> Result<BeginOutcome, GateError> {
        let key = NormalizedHash::new(hash);
        if key.is_empty() {
            return Err(GateError::EmptyHash);
        }

        let slot = self.locks.slot(&key);
        let _guard = slot.lock();

        if self.is_used_normalized(&key) {
            debug!("Rejecting used hash {key}");
            return Err(GateError::AlreadyUsed(key));
        }

        let Some(entry) = self.store.entry(&key) else {
            return Err(GateError::NotVerified(key));
        };

        match entry.status {
            HashStatus::Used => Err(GateError::AlreadyUsed(key)),
            HashStatus::Locked if self.tracker.contains(&key) => {
                debug!("Hash {key} already locked with an open session, joining");
                Ok(BeginOutcome::Joined)
            }
            HashStatus::Locked => Err(GateError::InFlight(key)),
            HashStatus::Verified => {
                self.persist(&key, self.store.set_status(&key, HashStatus::Locked));
                self.tracker.start(&key);
                info!("Locked hash {key} for a paired query session");
                emit(
                    self.events.as_ref(),
                    GatewayEvent::HashLocked {
                        hash: key.to_string(),
                    },
                );
                Ok(BeginOutcome::Locked)
            }
        }
    }

    /// Record that one paired call finished successfully.
    ///
    /// The second distinct sub-path consumes the hash: its entry becomes
    /// `used`, it is written to the used-hash index and the session closes.
    pub fn mark_sub_path(&self, hash: &str, which: SubPath) -> MarkOutcome {
        let key = NormalizedHash::new(hash);
        let slot = self.locks.slot(&key);
        let _guard = slot.lock();

        match self.tracker.mark(&key, which) {
            None => {
                debug!("No open session for {key}, ignoring {which:?} completion");
                MarkOutcome::NotTracked
            }
            Some(false) => {
                debug!("Hash {key}: {which:?} call done, waiting for its pair");
                MarkOutcome::Pending
            }
            Some(true) => {
                self.tracker.remove(&key);
                match self.store.consume(&key, Utc::now()) {
                    Ok(false) => warn!("Hash {key} completed but has no ledger entry"),
                    result => self.persist(&key, result),
                }
                info!("Both paired calls done, hash {key} is now used");
                emit(
                    self.events.as_ref(),
                    GatewayEvent::HashConsumed {
                        hash: key.to_string(),
                    },
                );
                MarkOutcome::Consumed
            }
        }
    }

    /// Release a locked hash after a paired call failed.
    ///
    /// Moves `locked → verified` and closes the session so the same proof can
    /// be retried. A no-op for any other state. Returns whether the hash was
    /// released.
    pub fn cancel_gated_operation(&self, hash: &str) -> bool {
        let key = NormalizedHash::new(hash);
        let slot = self.locks.slot(&key);
        let _guard = slot.lock();
        self.release_locked(&key)
    }

    /// Remove used records older than `retention`. Returns the number of
    /// records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the pruned ledger could not be persisted.
    pub fn expire(&self, retention: Duration) -> Result<usize, LedgerError> {
        let cutoff = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let removed = self.store.expire(cutoff)?;
        if removed > 0 {
            info!("Expired {removed} hash records older than {cutoff}");
        }
        self.locks.prune();
        Ok(removed)
    }

    /// Release locks whose session is gone or older than `max_age`.
    ///
    /// Covers sessions abandoned by a crashed caller and `locked` entries
    /// loaded from disk after a restart (the tracker does not survive one).
    /// Returns the released hashes.
    pub fn release_stale(&self, max_age: Duration) -> Vec<NormalizedHash> {
        let mut candidates = self.tracker.stale(max_age);
        candidates.extend(
            self.store
                .entries()
                .into_iter()
                .filter(|(hash, entry)| {
                    entry.status == HashStatus::Locked && !self.tracker.contains(hash)
                })
                .map(|(hash, _)| hash),
        );

        let mut released = Vec::new();
        for key in candidates {
            let slot = self.locks.slot(&key);
            let _guard = slot.lock();

            let expired = self
                .tracker
                .get(&key)
                .map_or(true, |status| status.started_at.elapsed() > max_age);
            if expired && self.release_locked(&key) {
                warn!("Released abandoned lock on {key}");
                released.push(key);
            }
        }
        released
    }

    /// Number of open paired query sessions.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    fn is_used_normalized(&self, key: &NormalizedHash) -> bool {
        self.store.used_at(key).is_some()
            || self
                .store
                .entry(key)
                .is_some_and(|entry| entry.status == HashStatus::Used)
    }

    /// Caller must hold the hash lock.
    fn release_locked(&self, key: &NormalizedHash) -> bool {
        let had_session = self.tracker.remove(key).is_some();

        let locked = self
            .store
            .entry(key)
            .is_some_and(|entry| entry.status == HashStatus::Locked);
        if !locked {
            if had_session {
                debug!("Closed session for {key}, which was not locked");
            }
            return false;
        }

        self.persist(key, self.store.set_status(key, HashStatus::Verified));
        info!("Released hash {key} back to verified");
        emit(
            self.events.as_ref(),
            GatewayEvent::HashReleased {
                hash: key.to_string(),
            },
        );
        true
    }

    fn persist(&self, key: &NormalizedHash, result: Result<bool, LedgerError>) {
        if let Err(e) = result {
            warn!("Failed to persist status change for {key}: {e}");
            emit(
                self.events.as_ref(),
                GatewayEvent::Error {
                    message: format!("ledger write failed for {key}: {e}"),
                },
            );
        }
    }
}
