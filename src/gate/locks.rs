//! Per-hash mutual exclusion.

use crate::ledger::NormalizedHash;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Table of one mutex per normalized hash.
///
/// Callers take the slot and lock it for the duration of a read-modify-write:
///
/// ```rust,ignore
/// let slot = locks.slot(&hash);
/// let _guard = slot.lock();
/// ```
#[derive(Debug, Default)]
pub(crate) struct HashLocks {
    slots: Mutex<HashMap<NormalizedHash, Arc<Mutex<()>>>>,
}

impl HashLocks {
    pub(crate) fn slot(&self, hash: &NormalizedHash) -> Arc<Mutex<()>> {
        Arc::clone(self.slots.lock().entry(hash.clone()).or_default())
    }

    /// Drop slots no caller currently holds. Returns the number removed.
    pub(crate) fn prune(&self) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        before - slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }
}
