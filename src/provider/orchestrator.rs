//! Sequential priority-ordered failover across registered providers.

use super::{
    redact, ContractInfo, ListArgs, NormalizedTransaction, NormalizedTransfer, Operation,
    Provider, ProviderError, ProviderRegistry, QueryError,
};
use crate::event::{emit, GatewayEvent, GatewayEventsSender};
use parking_lot::RwLock;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Records returned by the first provider that answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryOutcome<T> {
    /// Name of the provider that answered.
    pub provider: String,
    /// Normalized records.
    pub records: T,
}

/// Counters kept by the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStats {
    /// Queries answered by some provider.
    pub successes: u64,
    /// Individual adapter failures (including timeouts).
    pub provider_failures: u64,
    /// Queries no provider could answer.
    pub exhausted: u64,
}

/// Runs logical operations against the registry with failover.
pub struct QueryOrchestrator {
    registry: ProviderRegistry,
    last_provider: RwLock<Option<String>>,
    stats: RwLock<OrchestratorStats>,
    events: Option<GatewayEventsSender>,
}

impl QueryOrchestrator {
    /// Create an orchestrator over `registry`.
    #[must_use]
    pub fn new(registry: ProviderRegistry) -> Self {
        if registry.is_empty() {
            warn!("No upstream providers enabled, every query will fail");
        }
        Self {
            registry,
            last_provider: RwLock::new(None),
            stats: RwLock::new(OrchestratorStats::default()),
            events: None,
        }
    }

    /// Emit provider failure events on `events`.
    #[must_use]
    pub fn with_events(mut self, events: GatewayEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    /// List transactions of `args.address`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::AllProvidersExhausted`] if no provider answered.
    pub async fn transactions(
        &self,
        args: &ListArgs,
    ) -> Result<QueryOutcome<Vec<NormalizedTransaction>>, QueryError> {
        self.execute_with_failover(Operation::Transactions, |provider, credential| {
            let args = args.clone();
            async move { provider.transactions(&args, credential.as_deref()).await }
        })
        .await
    }

    /// List token transfers of `args.address`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::AllProvidersExhausted`] if no provider answered.
    pub async fn token_transfers(
        &self,
        args: &ListArgs,
    ) -> Result<QueryOutcome<Vec<NormalizedTransfer>>, QueryError> {
        self.execute_with_failover(Operation::TokenTransfers, |provider, credential| {
            let args = args.clone();
            async move { provider.token_transfers(&args, credential.as_deref()).await }
        })
        .await
    }

    /// Fetch metadata of the token contract at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::AllProvidersExhausted`] if no provider answered.
    pub async fn contract_info(
        &self,
        address: &str,
    ) -> Result<QueryOutcome<ContractInfo>, QueryError> {
        self.execute_with_failover(Operation::ContractInfo, |provider, credential| {
            let address = address.to_string();
            async move { provider.contract_info(&address, credential.as_deref()).await }
        })
        .await
    }

    /// Try each provider in priority order until one succeeds.
    ///
    /// Each attempt takes the next credential from the provider's pool and
    /// runs under the provider's timeout. Errors, timeouts and unsupported
    /// operations all move on to the next provider.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::AllProvidersExhausted`] once every provider
    /// failed.
    pub async fn execute_with_failover<T, F, Fut>(
        &self,
        operation: Operation,
        call: F,
    ) -> Result<QueryOutcome<T>, QueryError>
    where
        F: Fn(Arc<dyn Provider>, Option<String>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        for entry in self.registry.entries() {
            let credential = entry.credentials().next().map(str::to_string);
            match &credential {
                Some(c) => debug!(
                    "Trying {} for {operation} with credential {}",
                    entry.name(),
                    redact(c)
                ),
                None => debug!("Trying {} for {operation}", entry.name()),
            }

            let attempt = tokio::time::timeout(entry.timeout(), call(entry.provider(), credential));
            let result = match attempt.await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(entry.timeout())),
            };

            match result {
                Ok(records) => {
                    info!("{operation} served by {}", entry.name());
                    *self.last_provider.write() = Some(entry.name().to_string());
                    self.stats.write().successes += 1;
                    return Ok(QueryOutcome {
                        provider: entry.name().to_string(),
                        records,
                    });
                }
                Err(e) => {
                    warn!(
                        "Provider {} failed for {operation}: {e}, trying next provider",
                        entry.name()
                    );
                    self.stats.write().provider_failures += 1;
                    emit(
                        self.events.as_ref(),
                        GatewayEvent::ProviderFailed {
                            provider: entry.name().to_string(),
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }

        warn!(
            "All {} providers failed for {operation}",
            self.registry.len()
        );
        self.stats.write().exhausted += 1;
        emit(
            self.events.as_ref(),
            GatewayEvent::ProvidersExhausted {
                operation: operation.to_string(),
            },
        );
        Err(QueryError::AllProvidersExhausted { operation })
    }

    /// Provider that answered the most recent successful query.
    #[must_use]
    pub fn last_provider(&self) -> Option<String> {
        self.last_provider.read().clone()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> OrchestratorStats {
        *self.stats.read()
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }
}
