//! Hash ledger: durable record of verified burn proofs.
//!
//! The ledger owns two maps keyed by [`NormalizedHash`]:
//!
//! - the verification ledger (`hash -> {from, timestamp, status}`)
//! - the used-hash index (`hash -> timestamp`)
//!
//! The used-hash index exists independently of the verification ledger so a
//! consumed proof stays consumed even after its ledger entry is pruned.
//!
//! Two stores implement [`HashStore`]:
//!
//! - [`FileStore`] rewrites two JSON files in full on every mutation
//! - [`MemoryStore`] keeps everything in memory (tests, ephemeral runs)
//!
//! Every mutator applies the change in memory *before* persisting. A
//! persistence error is returned to the caller but the in-memory transition
//! is kept.

mod file;
mod memory;

pub use file::{FileStore, USED_HASHES_FILE, VERIFIED_HASHES_FILE};
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by ledger persistence.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A ledger file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A ledger file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Ledger contents could not be encoded.
    #[error("failed to encode ledger: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A transaction hash with any `0x` prefix stripped and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedHash(String);

impl NormalizedHash {
    /// Normalize a raw hash string.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        match lower.strip_prefix("0x") {
            Some(rest) => Self(rest.to_string()),
            None => Self(lower),
        }
    }

    /// The normalized string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the hash is empty after normalization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NormalizedHash {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<&String> for NormalizedHash {
    fn from(raw: &String) -> Self {
        Self::new(raw)
    }
}

/// Persisted lifecycle status of a verified hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashStatus {
    /// Burn proof verified, not yet in use.
    Verified,
    /// A paired query session is in flight.
    Locked,
    /// Consumed. Terminal.
    Used,
}

impl fmt::Display for HashStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Verified => "verified",
            Self::Locked => "locked",
            Self::Used => "used",
        })
    }
}

/// One verification ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Address credited with the burn.
    #[serde(rename = "from")]
    pub owner: String,
    /// When the proof was verified.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Lifecycle status.
    pub status: HashStatus,
}

impl LedgerEntry {
    /// A freshly verified entry stamped now.
    #[must_use]
    pub fn verified(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            timestamp: Utc::now(),
            status: HashStatus::Verified,
        }
    }
}

/// Consumption timestamp stored in the used-hash index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsedAt(#[serde(with = "chrono::serde::ts_milliseconds")] pub DateTime<Utc>);

/// Storage backend for the hash ledger.
///
/// Implementations must be internally synchronized; the verification gate
/// adds per-hash mutual exclusion on top.
pub trait HashStore: Send + Sync {
    /// Look up the ledger entry for a hash.
    fn entry(&self, hash: &NormalizedHash) -> Option<LedgerEntry>;

    /// Look up the consumption time of a hash in the used-hash index.
    fn used_at(&self, hash: &NormalizedHash) -> Option<DateTime<Utc>>;

    /// Insert or replace a ledger entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the change could not be persisted.
    fn insert(&self, hash: &NormalizedHash, entry: LedgerEntry) -> Result<(), LedgerError>;

    /// Change the status of an existing entry. Returns `false` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the change could not be persisted.
    fn set_status(&self, hash: &NormalizedHash, status: HashStatus) -> Result<bool, LedgerError>;

    /// Mark an entry `used` and record it in the used-hash index.
    /// Returns `false` when the hash has no ledger entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the change could not be persisted.
    fn consume(&self, hash: &NormalizedHash, at: DateTime<Utc>) -> Result<bool, LedgerError>;

    /// Remove used-index records and `used` ledger entries stamped before
    /// `cutoff`. Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the change could not be persisted.
    fn expire(&self, cutoff: DateTime<Utc>) -> Result<usize, LedgerError>;

    /// Copy of every ledger entry, ordered by hash.
    fn entries(&self) -> Vec<(NormalizedHash, LedgerEntry)>;

    /// Number of records in the used-hash index.
    fn used_count(&self) -> usize;
}

/// In-memory ledger maps shared by both stores.
#[derive(Debug, Default, Clone)]
pub(crate) struct LedgerState {
    pub(crate) verified: BTreeMap<NormalizedHash, LedgerEntry>,
    pub(crate) used: BTreeMap<NormalizedHash, UsedAt>,
}

impl LedgerState {
    pub(crate) fn set_status(&mut self, hash: &NormalizedHash, status: HashStatus) -> bool {
        match self.verified.get_mut(hash) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    pub(crate) fn consume(&mut self, hash: &NormalizedHash, at: DateTime<Utc>) -> bool {
        if !self.set_status(hash, HashStatus::Used) {
            return false;
        }
        self.used.insert(hash.clone(), UsedAt(at));
        true
    }

    /// Returns `(used_index_removed, ledger_removed)`.
    pub(crate) fn expire(&mut self, cutoff: DateTime<Utc>) -> (usize, usize) {
        let used_before = self.used.len();
        self.used.retain(|_, at| at.0 >= cutoff);

        let verified_before = self.verified.len();
        self.verified
            .retain(|_, entry| entry.status != HashStatus::Used || entry.timestamp >= cutoff);

        (
            used_before - self.used.len(),
            verified_before - self.verified.len(),
        )
    }
}
