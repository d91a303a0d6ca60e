//! JSON file-backed hash store.
//!
//! Layout under the data directory:
//!
//! ```text
//! verified-hashes.json   { "<hash>": { "from": "...", "timestamp": 1700000000000, "status": "verified" } }
//! used-hashes.json       { "<hash>": 1700000000000 }
//! ```
//!
//! Each mutation rewrites the affected file(s) in full through a temporary
//! file in the same directory followed by an atomic rename.

use super::{
    HashStatus, HashStore, LedgerEntry, LedgerError, LedgerState, NormalizedHash, UsedAt,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the verification ledger.
pub const VERIFIED_HASHES_FILE: &str = "verified-hashes.json";

/// File name of the used-hash index.
pub const USED_HASHES_FILE: &str = "used-hashes.json";

/// Hash store persisted as two human-readable JSON files.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    verified_path: PathBuf,
    used_path: PathBuf,
    state: Mutex<LedgerState>,
}

impl FileStore {
    /// Open (or create) the ledger files in `dir`.
    ///
    /// A file that exists but cannot be parsed is moved aside with a
    /// `.corrupt` suffix and replaced with an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a file cannot
    /// be read or written.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| LedgerError::Write {
            path: dir.clone(),
            source,
        })?;

        let verified_path = dir.join(VERIFIED_HASHES_FILE);
        let used_path = dir.join(USED_HASHES_FILE);

        let verified: BTreeMap<NormalizedHash, LedgerEntry> = load_map(&verified_path)?;
        let used: BTreeMap<NormalizedHash, UsedAt> = load_map(&used_path)?;

        // Keys written by older tools may not be normalized.
        let verified = verified
            .into_iter()
            .map(|(hash, entry)| (NormalizedHash::new(hash.as_str()), entry))
            .collect();
        let used = used
            .into_iter()
            .map(|(hash, at)| (NormalizedHash::new(hash.as_str()), at))
            .collect();

        let store = Self {
            dir,
            verified_path,
            used_path,
            state: Mutex::new(LedgerState { verified, used }),
        };

        {
            let state = store.state.lock();
            info!(
                "Loaded hash ledger from {} ({} verified, {} used)",
                store.dir.display(),
                state.verified.len(),
                state.used.len()
            );
            store.write_verified(&state)?;
            store.write_used(&state)?;
        }

        Ok(store)
    }

    /// Directory holding the ledger files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_verified(&self, state: &LedgerState) -> Result<(), LedgerError> {
        write_atomic(&self.dir, &self.verified_path, &state.verified)?;
        debug!("Saved {} verified hashes", state.verified.len());
        Ok(())
    }

    fn write_used(&self, state: &LedgerState) -> Result<(), LedgerError> {
        write_atomic(&self.dir, &self.used_path, &state.used)?;
        debug!("Saved {} used hashes", state.used.len());
        Ok(())
    }
}

impl HashStore for FileStore {
    fn entry(&self, hash: &NormalizedHash) -> Option<LedgerEntry> {
        self.state.lock().verified.get(hash).cloned()
    }

    fn used_at(&self, hash: &NormalizedHash) -> Option<DateTime<Utc>> {
        self.state.lock().used.get(hash).map(|at| at.0)
    }

    fn insert(&self, hash: &NormalizedHash, entry: LedgerEntry) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        state.verified.insert(hash.clone(), entry);
        self.write_verified(&state)
    }

    fn set_status(&self, hash: &NormalizedHash, status: HashStatus) -> Result<bool, LedgerError> {
        let mut state = self.state.lock();
        if !state.set_status(hash, status) {
            return Ok(false);
        }
        self.write_verified(&state)?;
        Ok(true)
    }

    fn consume(&self, hash: &NormalizedHash, at: DateTime<Utc>) -> Result<bool, LedgerError> {
        let mut state = self.state.lock();
        if !state.consume(hash, at) {
            return Ok(false);
        }
        // Both files are attempted even if the first write fails.
        let verified = self.write_verified(&state);
        let used = self.write_used(&state);
        verified.and(used)?;
        Ok(true)
    }

    fn expire(&self, cutoff: DateTime<Utc>) -> Result<usize, LedgerError> {
        let mut state = self.state.lock();
        let (used, ledger) = state.expire(cutoff);
        if ledger > 0 {
            self.write_verified(&state)?;
        }
        if used > 0 {
            self.write_used(&state)?;
        }
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

fn load_map<V: DeserializeOwned>(
    path: &Path,
) -> Result<BTreeMap<NormalizedHash, V>, LedgerError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("{} does not exist, starting empty", path.display());
            return Ok(BTreeMap::new());
        }
        Err(source) => {
            return Err(LedgerError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    match serde_json::from_str(&content) {
        Ok(map) => Ok(map),
        Err(e) => {
            let aside = path.with_extension("json.corrupt");
            warn!(
                "Failed to parse {}: {e}; moving it to {} and starting empty",
                path.display(),
                aside.display()
            );
            std::fs::rename(path, &aside).map_err(|source| LedgerError::Write {
                path: aside.clone(),
                source,
            })?;
            Ok(BTreeMap::new())
        }
    }
}

fn write_atomic<T: Serialize>(dir: &Path, path: &Path, value: &T) -> Result<(), LedgerError> {
    let json = serde_json::to_vec_pretty(value)?;
    let write_err = |source| LedgerError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&json).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
