//! Provider registry and rotating credential pools.

use super::normalize::TransferRule;
use super::{redact, Provider, RpcProvider, ShyftProvider, SolscanProvider};
use crate::config::{ProviderConfig, ProvidersConfig};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Registry name of the QuickNode RPC provider.
pub const QUICKNODE: &str = "quicknode";
/// Registry name of the SolScan indexer.
pub const SOLSCAN: &str = "solscan";
/// Registry name of the Shyft API.
pub const SHYFT: &str = "shyft";
/// Registry name of the public Solana node pool.
pub const SOLNODE: &str = "solnode";

/// Default per-call timeout of an adapter.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Ordered pool of credentials handed out round-robin.
///
/// Every call to [`CredentialPool::next`] advances the index, whether or
/// not the call that used the credential succeeds.
pub struct CredentialPool {
    items: Vec<String>,
    index: Mutex<usize>,
}

impl CredentialPool {
    /// Create a pool. Empty strings are dropped.
    #[must_use]
    pub fn new(items: Vec<String>) -> Self {
        Self {
            items: items.into_iter().filter(|item| !item.is_empty()).collect(),
            index: Mutex::new(0),
        }
    }

    /// A pool without credentials.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Return the current credential and advance to the next one.
    #[must_use]
    pub fn next(&self) -> Option<&str> {
        if self.items.is_empty() {
            return None;
        }
        let mut index = self.index.lock();
        let current = *index;
        *index = (current + 1) % self.items.len();
        self.items.get(current).map(String::as_str)
    }

    /// Number of credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the pool holds no credentials.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted: Vec<String> = self.items.iter().map(|item| redact(item)).collect();
        f.debug_struct("CredentialPool")
            .field("items", &redacted)
            .field("index", &*self.index.lock())
            .finish()
    }
}

/// One registered provider.
pub struct ProviderEntry {
    name: String,
    priority: u32,
    timeout: Duration,
    credentials: CredentialPool,
    provider: Arc<dyn Provider>,
}

impl ProviderEntry {
    /// Create an entry with no credentials and the default timeout.
    pub fn new(name: impl Into<String>, priority: u32, provider: Arc<dyn Provider>) -> Self {
        Self {
            name: name.into(),
            priority,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            credentials: CredentialPool::empty(),
            provider,
        }
    }

    /// Set the rotating credential pool.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Vec<String>) -> Self {
        self.credentials = CredentialPool::new(credentials);
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Provider name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Priority rank; lower runs first.
    #[must_use]
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Rotating credentials.
    #[must_use]
    pub fn credentials(&self) -> &CredentialPool {
        &self.credentials
    }

    /// The adapter.
    #[must_use]
    pub fn provider(&self) -> Arc<dyn Provider> {
        Arc::clone(&self.provider)
    }
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Enabled providers in ascending priority order.
///
/// Ties keep registration order.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    entries: Vec<ProviderEntry>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider, keeping the priority order.
    pub fn register(&mut self, entry: ProviderEntry) {
        debug!(
            "Registering provider {} (priority {}, {} credentials)",
            entry.name,
            entry.priority,
            entry.credentials.len()
        );
        self.entries.push(entry);
        self.entries.sort_by_key(ProviderEntry::priority);
    }

    /// Builder form of [`ProviderRegistry::register`].
    #[must_use]
    pub fn with(mut self, entry: ProviderEntry) -> Self {
        self.register(entry);
        self
    }

    /// Build the registry from configuration. Disabled providers and
    /// providers without an endpoint are left out.
    #[must_use]
    pub fn from_config(config: &ProvidersConfig, http: &reqwest::Client) -> Self {
        let mut registry = Self::new();

        let candidates = [
            (QUICKNODE, &config.quicknode),
            (SOLSCAN, &config.solscan),
            (SHYFT, &config.shyft),
            (SOLNODE, &config.solnode),
        ];

        for (name, cfg) in candidates {
            if !cfg.enabled {
                info!("Provider {name} disabled");
                continue;
            }
            match build_entry(name, cfg, http) {
                Some(entry) => registry.register(entry),
                None => warn!("Provider {name} enabled but has no api_urls, skipping"),
            }
        }

        info!(
            "Provider order: [{}]",
            registry.names().collect::<Vec<_>>().join(", ")
        );
        registry
    }

    /// Entries in priority order.
    #[must_use]
    pub fn entries(&self) -> &[ProviderEntry] {
        &self.entries
    }

    /// Provider names in priority order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(ProviderEntry::name)
    }

    /// Number of enabled providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no provider is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn build_entry(name: &str, cfg: &ProviderConfig, http: &reqwest::Client) -> Option<ProviderEntry> {
    let first_url = cfg.api_urls.first().cloned();
    let (provider, credentials): (Arc<dyn Provider>, Vec<String>) = match name {
        QUICKNODE => (
            Arc::new(RpcProvider::with_api_key(
                first_url?,
                http.clone(),
                TransferRule::FeePayer,
            )),
            cfg.api_keys.clone(),
        ),
        // The public node pool has no keys; it rotates across endpoints.
        SOLNODE => {
            if cfg.api_urls.is_empty() {
                return None;
            }
            (
                Arc::new(RpcProvider::rotating_endpoints(
                    http.clone(),
                    TransferRule::LargestDelta,
                )),
                cfg.api_urls.clone(),
            )
        }
        SOLSCAN => (
            Arc::new(SolscanProvider::new(first_url?, http.clone())),
            cfg.api_keys.clone(),
        ),
        SHYFT => (
            Arc::new(ShyftProvider::new(first_url?, http.clone())),
            cfg.api_keys.clone(),
        ),
        _ => return None,
    };

    Some(
        ProviderEntry::new(name, cfg.priority, provider)
            .with_credentials(credentials)
            .with_timeout(Duration::from_secs(cfg.timeout_secs)),
    )
}
