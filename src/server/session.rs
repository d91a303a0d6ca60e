//! LRU-bounded session store keyed by the `x-session-id` header.

use crate::service::Session;
use axum::http::HeaderMap;
use lru::LruCache;
use parking_lot::Mutex;
use rand::RngCore;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Request and response header carrying the session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Default capacity (100,000 sessions).
const DEFAULT_SESSION_CAPACITY: usize = 100_000;

/// Longest session id accepted from a client.
const MAX_SESSION_ID_LEN: usize = 128;

/// Session store shared by all handlers.
///
/// The least recently used session is evicted once the store is full; an
/// evicted client simply has to verify again.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<LruCache<String, Session>>>,
}

impl SessionStore {
    /// Create a store with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SESSION_CAPACITY)
    }

    /// Create a store holding at most `capacity` sessions.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
        }
    }

    /// Resolve the session of a request. A missing or malformed id gets a
    /// fresh one and an empty session.
    #[must_use]
    pub fn load(&self, headers: &HeaderMap) -> (String, Session) {
        let Some(id) = headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|id| is_valid_id(id))
        else {
            return (new_session_id(), Session::default());
        };

        let session = self.inner.lock().get(id).cloned().unwrap_or_default();
        (id.to_string(), session)
    }

    /// Save the session a handler finished with.
    ///
    /// `loaded` is the copy returned by [`Self::load`]. An unchanged session
    /// is not written back, so a request that did not touch the session
    /// cannot overwrite a change made meanwhile by another request on the
    /// same id.
    pub fn commit(&self, id: &str, loaded: &Session, session: Session) {
        if *loaded != session {
            self.inner.lock().put(id.to_string(), session);
        }
    }

    /// Number of stored sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True when no session is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn new_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
