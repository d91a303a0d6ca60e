//! In-memory hash store.

use super::{HashStatus, HashStore, LedgerEntry, LedgerError, LedgerState, NormalizedHash};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Hash store that never touches disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<LedgerState>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashStore for MemoryStore {
    fn entry(&self, hash: &NormalizedHash) -> Option<LedgerEntry> {
        self.state.lock().verified.get(hash).cloned()
    }

    fn used_at(&self, hash: &NormalizedHash) -> Option<DateTime<Utc>> {
        self.state.lock().used.get(hash).map(|at| at.0)
    }

    fn insert(&self, hash: &NormalizedHash, entry: LedgerEntry) -> Result<(), LedgerError> {
        self.state.lock().verified.insert(hash.clone(), entry);
        Ok(())
    }

    fn set_status(&self, hash: &NormalizedHash, status: HashStatus) -> Result<bool, LedgerError> {
        Ok(self.state.lock().set_status(hash, status))
    }

    fn consume(&self, hash: &NormalizedHash, at: DateTime<Utc>) -> Result<bool, LedgerError> {
        Ok(self.state.lock().consume(hash, at))
    }

    fn expire(&self, cutoff: DateTime<Utc>) -> Result<usize, LedgerError> {
        let (used, ledger) = self.state.lock().expire(cutoff);
        Ok(used + ledger)
    }

    fn entries(&self) -> Vec<(NormalizedHash, LedgerEntry)> {
        self.state
            .lock()
            .verified
            .iter()
            .map(|(hash, entry)| (hash.clone(), entry.clone()))
            .collect()
    }

    fn used_count(&self) -> usize {
        self.state.lock().used.len()
    }
}
