//! Gateway service: the inbound operations behind the HTTP routes.
//!
//! ```text
//!   verify ──▶ BurnChecker ──valid──▶ VerificationGate::add_verified_hash
//!
//!   list_transactions ────┐
//!                         ├─▶ begin ─▶ QueryOrchestrator ─▶ mark | cancel
//!   list_token_transfers ─┘
//!
//!   contract_info ──────────────────▶ QueryOrchestrator
//! ```
//!
//! A [`Session`] carries the verified proof of one client between calls.
//! Every gated call that passes `begin_gated_operation` ends in exactly one
//! `mark_sub_path` or `cancel_gated_operation`, whatever the outcome.

use crate::burn::{BurnCheck, BurnChecker};
use crate::config::{BurnChain, BurnVerificationConfig, PaginationConfig};
use crate::error::{Error, Result};
use crate::gate::{GateError, SubPath, VerificationGate};
use crate::ledger::NormalizedHash;
use crate::provider::{
    ContractInfo, ListArgs, NormalizedTransaction, NormalizedTransfer, OrchestratorStats,
    QueryError, QueryOrchestrator, QueryOutcome,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-client verification state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// A burn proof was verified in this session.
    pub verified: bool,
    /// Normalized hash of the proof.
    pub tx_hash: Option<String>,
    /// Address credited with the burn.
    pub from: Option<String>,
}

impl Session {
    /// Attach a verified proof.
    pub fn attach(&mut self, hash: &NormalizedHash, from: Option<String>) {
        self.verified = true;
        self.tx_hash = Some(hash.to_string());
        self.from = from;
    }

    /// Forget the proof.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Hash of the attached proof, if verified.
    #[must_use]
    pub fn verified_hash(&self) -> Option<&str> {
        self.tx_hash.as_deref().filter(|_| self.verified)
    }
}

/// Which parts of a found burn did not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundButInvalid {
    /// The burned token is the target token.
    pub is_target_contract: bool,
    /// The burned amount is the target amount.
    pub is_target_amount: bool,
}

/// Answer to `verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// The proof is valid and attached to the session.
    pub is_valid_burn: bool,
    /// Sender of the burn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Normalized hash.
    pub hash: String,
    /// The hash was verified earlier; the burn checker was not called.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_verified: bool,
    /// Set when a transfer to the burn address exists but does not match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_but_invalid: Option<FoundButInvalid>,
}

/// Answer to `verification_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatus {
    /// The session holds an unused verified proof.
    pub verified: bool,
    /// Hash attached to the session.
    pub hash: Option<String>,
    /// Address credited with the burn.
    pub from: Option<String>,
    /// The attached hash has been consumed.
    pub is_used: bool,
}

/// Paged listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    /// Account address.
    #[serde(default)]
    pub address: String,
    /// 1-based page.
    #[serde(default)]
    pub page: Option<u32>,
    /// Records per page.
    #[serde(default, alias = "offset")]
    pub page_size: Option<u32>,
}

/// The burn a client has to prove.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnRequirement {
    /// Chain the burn is checked on.
    pub chain: BurnChain,
    /// Token that must be burned.
    pub target_contract_address: String,
    /// Exact amount in whole tokens.
    pub target_amount: String,
    /// Destination that counts as a burn.
    pub burn_address: String,
}

impl BurnRequirement {
    /// The requirement of the active chain.
    #[must_use]
    pub fn from_config(config: &BurnVerificationConfig) -> Self {
        match config.chain {
            BurnChain::Sol => Self {
                chain: BurnChain::Sol,
                target_contract_address: config.target_contract_address.clone(),
                target_amount: config.target_amount.clone(),
                burn_address: config.burn_address.clone(),
            },
            BurnChain::Bsc => Self {
                chain: BurnChain::Bsc,
                target_contract_address: config.bsc.target_contract_address.clone(),
                target_amount: config.bsc.target_amount.clone(),
                burn_address: config.bsc.burn_address.clone(),
            },
        }
    }
}

/// Client-facing configuration. Holds no credentials or endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    /// Gating state and the burn to prove.
    pub burn_verification: PublicBurnVerification,
    /// Paging defaults and limits.
    pub pagination: PublicPagination,
    /// Registered providers in failover order.
    pub providers: Vec<String>,
    /// Provider of the last successful query.
    pub current_api_provider: Option<String>,
}

/// Burn section of [`PublicConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicBurnVerification {
    /// Listings require a verified proof.
    pub enabled: bool,
    /// Burn to prove.
    #[serde(flatten)]
    pub requirement: BurnRequirement,
}

/// Paging section of [`PublicConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPagination {
    /// Page used when the request has none.
    pub default_page: u32,
    /// Page size used when the request has none.
    pub default_page_size: u32,
    /// Largest page size accepted.
    pub max_page_size: u32,
}

/// The gateway's inbound operations.
pub struct GatewayService {
    gate: Arc<VerificationGate>,
    orchestrator: Arc<QueryOrchestrator>,
    checker: Arc<dyn BurnChecker>,
    gating: bool,
    pagination: PaginationConfig,
    requirement: BurnRequirement,
}

impl GatewayService {
    /// Create a service. Listings are gated only when `gating` is true.
    #[must_use]
    pub fn new(
        gate: Arc<VerificationGate>,
        orchestrator: Arc<QueryOrchestrator>,
        checker: Arc<dyn BurnChecker>,
        gating: bool,
    ) -> Self {
        Self {
            gate,
            orchestrator,
            checker,
            gating,
            pagination: PaginationConfig::default(),
            requirement: BurnRequirement::default(),
        }
    }

    /// Advertise `requirement` in [`GatewayService::public_config`].
    #[must_use]
    pub fn with_burn_requirement(mut self, requirement: BurnRequirement) -> Self {
        self.requirement = requirement;
        self
    }

    /// Use `pagination` for page defaults and limits.
    #[must_use]
    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// The verification gate.
    #[must_use]
    pub fn gate(&self) -> &Arc<VerificationGate> {
        &self.gate
    }

    /// Whether listings require a verified burn proof.
    #[must_use]
    pub fn gating(&self) -> bool {
        self.gating
    }

    /// Check a burn proof and attach it to the session.
    ///
    /// A hash verified earlier and not yet used is re-attached without
    /// calling the burn checker. A failed or invalid check clears the session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an empty hash, `Gate(AlreadyUsed)` for a
    /// consumed hash and `Burn` when the transaction cannot be checked.
    pub async fn verify(&self, session: &mut Session, hash: &str) -> Result<VerifyResponse> {
        let key = NormalizedHash::new(hash);
        if key.is_empty() {
            return Err(Error::InvalidRequest("txHash is required".into()));
        }

        if self.gate.is_used(key.as_str()) {
            debug!("Verification of used hash {key} rejected");
            return Err(GateError::AlreadyUsed(key).into());
        }

        if let Some(entry) = self.gate.details(key.as_str()) {
            info!("Hash {key} already verified, re-attaching to session");
            session.attach(&key, Some(entry.owner.clone()));
            return Ok(VerifyResponse {
                is_valid_burn: true,
                from: Some(entry.owner),
                hash: key.to_string(),
                already_verified: true,
                found_but_invalid: None,
            });
        }

        // The chain needs the hash as given; the normalized form is only the ledger key.
        let check = match self.checker.check(hash.trim()).await {
            Ok(check) => check,
            Err(e) => {
                warn!("Burn check for {key} failed: {e}");
                session.clear();
                return Err(e.into());
            }
        };

        if !check.is_valid_burn {
            info!("Hash {key} is not a valid burn");
            session.clear();
            return Ok(invalid_response(&key, check));
        }

        let owner = check.from.clone().unwrap_or_default();
        self.gate.add_verified_hash(key.as_str(), &owner)?;
        session.attach(&key, check.from.clone());
        Ok(VerifyResponse {
            is_valid_burn: true,
            from: check.from,
            hash: key.to_string(),
            already_verified: false,
            found_but_invalid: None,
        })
    }

    /// Report the verification state of a session.
    #[must_use]
    pub fn verification_status(&self, session: &Session) -> VerificationStatus {
        let is_used = session
            .tx_hash
            .as_deref()
            .is_some_and(|hash| self.gate.is_used(hash));
        VerificationStatus {
            verified: session.verified && !is_used,
            hash: session.tx_hash.clone(),
            from: session.from.clone(),
            is_used,
        }
    }

    /// List transactions of an address. The first paired call.
    ///
    /// # Errors
    ///
    /// Returns gate rejections, `InvalidRequest` for an empty address and
    /// `Query` when every provider failed.
    pub async fn list_transactions(
        &self,
        session: &mut Session,
        request: &ListRequest,
    ) -> Result<QueryOutcome<Vec<NormalizedTransaction>>> {
        let args = self.list_args(request);
        let query = self.orchestrator.transactions(&args);
        self.gated(session, SubPath::First, &args.address, query).await
    }

    /// List token transfers of an address. The second paired call.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list_transactions`].
    pub async fn list_token_transfers(
        &self,
        session: &mut Session,
        request: &ListRequest,
    ) -> Result<QueryOutcome<Vec<NormalizedTransfer>>> {
        let args = self.list_args(request);
        let query = self.orchestrator.token_transfers(&args);
        self.gated(session, SubPath::Second, &args.address, query).await
    }

    /// Fetch token contract metadata. Not gated.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an empty address and `Query` when every
    /// provider failed.
    pub async fn contract_info(&self, address: &str) -> Result<QueryOutcome<ContractInfo>> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::InvalidRequest("address is required".into()));
        }
        Ok(self.orchestrator.contract_info(address).await?)
    }

    /// Forget the session's proof.
    pub fn clear_verification(&self, session: &mut Session) {
        session.clear();
    }

    /// Provider that answered the most recent successful query.
    #[must_use]
    pub fn current_provider(&self) -> Option<String> {
        self.orchestrator.last_provider()
    }

    /// Registered providers in failover order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        self.orchestrator
            .registry()
            .names()
            .map(str::to_string)
            .collect()
    }

    /// Configuration a client needs to drive the burn flow.
    #[must_use]
    pub fn public_config(&self) -> PublicConfig {
        PublicConfig {
            burn_verification: PublicBurnVerification {
                enabled: self.gating,
                requirement: self.requirement.clone(),
            },
            pagination: PublicPagination {
                default_page: self.pagination.default_page,
                default_page_size: self.pagination.default_page_size,
                max_page_size: self.pagination.max_page_size,
            },
            providers: self.provider_names(),
            current_api_provider: self.current_provider(),
        }
    }

    /// Query counters of the orchestrator.
    #[must_use]
    pub fn stats(&self) -> OrchestratorStats {
        self.orchestrator.stats()
    }

    fn list_args(&self, request: &ListRequest) -> ListArgs {
        let (page, page_size) = self.pagination.resolve(request.page, request.page_size);
        ListArgs::new(request.address.trim(), page, page_size)
    }

    /// Run `query` inside the paired session of the session's proof.
    /// `query` is not polled before the gate admits the caller.
    async fn gated<T>(
        &self,
        session: &mut Session,
        which: SubPath,
        address: &str,
        query: impl Future<Output = std::result::Result<T, QueryError>>,
    ) -> Result<T> {
        if !self.gating {
            if address.is_empty() {
                return Err(Error::InvalidRequest("address is required".into()));
            }
            return Ok(query.await?);
        }

        let Some(hash) = session.verified_hash().map(str::to_string) else {
            return Err(Error::NotVerified);
        };

        match self.gate.begin_gated_operation(&hash) {
            Ok(outcome) => debug!("Gate admitted {which:?} call for {hash}: {outcome:?}"),
            Err(GateError::AlreadyUsed(key)) => {
                session.clear();
                return Err(GateError::AlreadyUsed(key).into());
            }
            Err(e) => return Err(e.into()),
        }

        if address.is_empty() {
            self.gate.cancel_gated_operation(&hash);
            return Err(Error::InvalidRequest("address is required".into()));
        }

        match query.await {
            Ok(records) => {
                self.gate.mark_sub_path(&hash, which);
                Ok(records)
            }
            Err(e) => {
                self.gate.cancel_gated_operation(&hash);
                Err(e.into())
            }
        }
    }
}

fn invalid_response(key: &NormalizedHash, check: BurnCheck) -> VerifyResponse {
    VerifyResponse {
        is_valid_burn: false,
        from: check.from,
        hash: key.to_string(),
        already_verified: false,
        found_but_invalid: check.found.then_some(FoundButInvalid {
            is_target_contract: check.is_target_contract,
            is_target_amount: check.is_target_amount,
        }),
    }
}
