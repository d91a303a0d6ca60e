//! Upstream data providers and priority-ordered failover.
//!
//! # Architecture
//!
//! ```text
//! query(operation, args)
//!        │
//!        ▼
//! ┌──────────────────────┐
//! │ next provider by     │◀──────────────┐
//! │ priority (asc)       │               │
//! └─────────┬────────────┘               │
//!           │ rotate credential          │
//!           ▼                            │
//! ┌──────────────────────┐   error /     │
//! │ adapter call under   │── timeout / ──┘
//! │ provider timeout     │   unsupported
//! └─────────┬────────────┘
//!           │ ok
//!           ▼
//!   normalized records + provider name
//! ```
//!
//! Adapter failures never leave this module; once every provider has failed
//! the caller sees a single [`QueryError::AllProvidersExhausted`].

pub mod normalize;
mod orchestrator;
mod registry;
pub(crate) mod rpc;
mod shyft;
mod solscan;

pub use normalize::{
    ContractInfo, NormalizedTransaction, NormalizedTransfer, TokenHolder, TransferRule, TxStatus,
};
pub use orchestrator::{OrchestratorStats, QueryOrchestrator, QueryOutcome};
pub use registry::{
    CredentialPool, ProviderEntry, ProviderRegistry, DEFAULT_PROVIDER_TIMEOUT, QUICKNODE, SHYFT,
    SOLNODE, SOLSCAN,
};
pub use rpc::RpcProvider;
pub use shyft::ShyftProvider;
pub use solscan::SolscanProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Logical operations served through the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// List transactions touching an address.
    Transactions,
    /// List token transfers / token holdings of an address.
    TokenTransfers,
    /// Fetch token contract metadata.
    ContractInfo,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transactions => "transactions",
            Self::TokenTransfers => "token_transfers",
            Self::ContractInfo => "contract_info",
        })
    }
}

/// Arguments of a paged listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListArgs {
    /// Account address.
    pub address: String,
    /// 1-based page number.
    pub page: u32,
    /// Records per page.
    pub page_size: u32,
}

impl ListArgs {
    /// Create listing arguments. `page` and `page_size` are raised to 1.
    #[must_use]
    pub fn new(address: impl Into<String>, page: u32, page_size: u32) -> Self {
        Self {
            address: address.into(),
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Number of records preceding this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Adapter-level failure. Always recovered by the orchestrator.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider does not implement the operation.
    #[error("{0} is not supported by this provider")]
    Unsupported(Operation),

    /// The call did not finish within the provider's timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Transport or HTTP status failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// Response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The upstream answered with an explicit error.
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Errors surfaced by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Every enabled provider failed.
    #[error("service temporarily unavailable, please try again later")]
    AllProvidersExhausted {
        /// The operation that could not be served.
        operation: Operation,
    },
}

/// An upstream data source.
///
/// `credential` is the entry the registry selected from the provider's
/// rotating pool for this call, if it has one. How it is applied (header,
/// endpoint URL) is up to the adapter.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Transaction history of `args.address`.
    async fn transactions(
        &self,
        args: &ListArgs,
        credential: Option<&str>,
    ) -> Result<Vec<NormalizedTransaction>, ProviderError> {
        let _ = (args, credential);
        Err(ProviderError::Unsupported(Operation::Transactions))
    }

    /// Token transfers / holdings of `args.address`.
    async fn token_transfers(
        &self,
        args: &ListArgs,
        credential: Option<&str>,
    ) -> Result<Vec<NormalizedTransfer>, ProviderError> {
        let _ = (args, credential);
        Err(ProviderError::Unsupported(Operation::TokenTransfers))
    }

    /// Metadata of the token contract at `address`.
    async fn contract_info(
        &self,
        address: &str,
        credential: Option<&str>,
    ) -> Result<ContractInfo, ProviderError> {
        let _ = (address, credential);
        Err(ProviderError::Unsupported(Operation::ContractInfo))
    }
}

/// Shorten a credential for logging: first 6 characters followed by `…`.
#[must_use]
pub fn redact(credential: &str) -> String {
    let prefix: String = credential.chars().take(6).collect();
    format!("{prefix}…")
}
