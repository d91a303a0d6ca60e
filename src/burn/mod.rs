//! Burn proof checking.
//!
//! A burn proof is a confirmed transaction whose logs show a transfer of the
//! target token to the burn address. [`RpcBurnChecker`] fetches the
//! transaction over Solana JSON-RPC, [`BscBurnChecker`] reads ERC-20
//! `Transfer` events from a BNB Smart Chain receipt. Both compare what they
//! find with the configured [`BurnTarget`].
//!
//! The amount is only judged once the token's decimals are known. If they
//! cannot be read the burn is reported as found but never as valid.

mod bsc;

pub use bsc::BscBurnChecker;

use crate::config::{BscBurnConfig, BurnVerificationConfig};
use crate::provider::normalize::{format_units, RpcAccount, RpcMintInfo, RpcTransaction};
use crate::provider::rpc::JsonRpcClient;
use crate::provider::ProviderError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while checking a burn proof.
#[derive(Debug, Error)]
pub enum BurnError {
    /// No hash supplied.
    #[error("transaction hash must not be empty")]
    EmptyHash,

    /// The chain does not know the transaction.
    #[error("transaction {0} not found, please check the hash")]
    NotFound(String),

    /// The transaction exists but failed.
    #[error("transaction {0} failed on chain")]
    Failed(String),

    /// The RPC call failed.
    #[error("burn check failed: {0}")]
    Rpc(#[from] ProviderError),
}

/// Result of checking one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnCheck {
    /// Right token, right amount.
    pub is_valid_burn: bool,
    /// Sender (fee payer) of the transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// A transfer to the burn address was found in the logs.
    pub found: bool,
    /// Mint of the burned token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Burned amount in whole tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// The burned token is the target token.
    pub is_target_contract: bool,
    /// The burned amount equals the target amount exactly.
    pub is_target_amount: bool,
}

/// Checks burn proofs.
#[async_trait]
pub trait BurnChecker: Send + Sync {
    /// Inspect the transaction `hash`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be fetched, does not
    /// exist or failed on chain. A transaction that is found but burns the
    /// wrong thing is not an error: it yields `is_valid_burn == false`.
    async fn check(&self, hash: &str) -> Result<BurnCheck, BurnError>;
}

/// What a valid burn must look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnTarget {
    /// Mint of the token that must be burned.
    pub contract_address: String,
    /// Exact amount in whole tokens.
    pub amount: String,
    /// Address the tokens must be sent to.
    pub burn_address: String,
}

impl BurnTarget {
    /// Build a target from configuration.
    #[must_use]
    pub fn from_config(config: &BurnVerificationConfig) -> Self {
        Self {
            contract_address: config.target_contract_address.clone(),
            amount: config.target_amount.clone(),
            burn_address: config.burn_address.clone(),
        }
    }

    /// Build a target from the BNB Smart Chain section.
    #[must_use]
    pub fn from_bsc_config(config: &BscBurnConfig) -> Self {
        Self {
            contract_address: config.target_contract_address.clone(),
            amount: config.target_amount.clone(),
            burn_address: config.burn_address.clone(),
        }
    }

    /// Compare a burn found in the logs with the target.
    #[must_use]
    pub fn evaluate(
        &self,
        from: Option<String>,
        mint: &str,
        raw_amount: &str,
        decimals: u8,
    ) -> BurnCheck {
        let amount = format_units(raw_amount, decimals);
        let is_target_contract = mint.eq_ignore_ascii_case(&self.contract_address);
        let is_target_amount = amount
            .as_deref()
            .is_some_and(|amount| amount == trim_amount(&self.amount));
        BurnCheck {
            is_valid_burn: is_target_contract && is_target_amount,
            from,
            found: true,
            token: Some(mint.to_string()),
            amount,
            is_target_contract,
            is_target_amount,
        }
    }

    /// A burn of `mint` whose amount could not be interpreted.
    ///
    /// The token is still compared with the target, but the amount is
    /// unknown so the burn is never valid.
    #[must_use]
    pub fn undetermined(&self, from: Option<String>, mint: &str) -> BurnCheck {
        BurnCheck {
            is_valid_burn: false,
            from,
            found: true,
            token: Some(mint.to_string()),
            amount: None,
            is_target_contract: mint.eq_ignore_ascii_case(&self.contract_address),
            is_target_amount: false,
        }
    }
}

/// Strip trailing fractional zeros and a trailing point: `"101.0"` → `"101"`.
fn trim_amount(amount: &str) -> &str {
    let amount = amount.trim();
    if amount.contains('.') {
        amount.trim_end_matches('0').trim_end_matches('.')
    } else {
        amount
    }
}

/// Find the first log line recording a transfer to `burn_address` and
/// extract `(mint, raw_amount)` from its `program: ` and `amount: ` fields.
#[must_use]
pub fn scan_logs(logs: &[String], burn_address: &str) -> Option<(String, String)> {
    logs.iter()
        .filter(|line| line.contains("Transfer") && line.contains(burn_address))
        .find_map(|line| {
            let mint = field(line, "program: ", |c| c.is_ascii_alphanumeric())
                .filter(|mint| mint.len() >= 32)?;
            let amount = field(line, "amount: ", |c| c.is_ascii_digit())
                .filter(|amount| !amount.is_empty())?;
            Some((mint.to_string(), amount.to_string()))
        })
}

fn field<'a>(line: &'a str, key: &str, accept: impl Fn(char) -> bool) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = &line[start..];
    let end = rest.find(|c: char| !accept(c)).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Burn checker backed by a Solana JSON-RPC endpoint.
#[derive(Debug)]
pub struct RpcBurnChecker {
    rpc_url: String,
    rpc: JsonRpcClient,
    target: BurnTarget,
}

impl RpcBurnChecker {
    /// Create a checker querying `rpc_url`.
    pub fn new(rpc_url: impl Into<String>, http: reqwest::Client, target: BurnTarget) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            rpc: JsonRpcClient::new(http),
            target,
        }
    }

    /// Build a checker from configuration.
    #[must_use]
    pub fn from_config(config: &BurnVerificationConfig, http: reqwest::Client) -> Self {
        Self::new(config.rpc_url.clone(), http, BurnTarget::from_config(config))
    }

    async fn mint_decimals(&self, mint: &str) -> Option<u8> {
        let lookup: Result<Value, ProviderError> = self
            .rpc
            .call(
                &self.rpc_url,
                None,
                "getAccountInfo",
                json!([mint, { "encoding": "jsonParsed" }]),
            )
            .await;

        let result = match lookup {
            Ok(result) => result,
            Err(e) => {
                warn!("Could not read decimals of {mint}: {e}");
                return None;
            }
        };
        let decimals = result.get("value").cloned().and_then(|value| {
            serde_json::from_value::<RpcAccount<RpcMintInfo>>(value)
                .ok()
                .map(|account| account.data.parsed.info.decimals)
        });
        if decimals.is_none() {
            warn!("{mint} is not a readable mint account");
        }
        decimals
    }
}

#[async_trait]
impl BurnChecker for RpcBurnChecker {
    async fn check(&self, hash: &str) -> Result<BurnCheck, BurnError> {
        let hash = hash.trim();
        if hash.is_empty() {
            return Err(BurnError::EmptyHash);
        }

        let tx: Option<RpcTransaction> = self
            .rpc
            .call(
                &self.rpc_url,
                None,
                "getTransaction",
                json!([
                    hash,
                    {
                        "encoding": "json",
                        "commitment": "confirmed",
                        "maxSupportedTransactionVersion": 0
                    }
                ]),
            )
            .await?;
        let tx = tx.ok_or_else(|| BurnError::NotFound(hash.to_string()))?;

        let meta = tx.meta.as_ref();
        if meta.and_then(|m| m.err.as_ref()).is_some_and(|err| !err.is_null()) {
            return Err(BurnError::Failed(hash.to_string()));
        }

        let from = tx.fee_payer();
        let logs = meta.map(|m| m.log_messages.as_slice()).unwrap_or_default();
        let Some((mint, raw_amount)) = scan_logs(logs, &self.target.burn_address) else {
            debug!("No transfer to the burn address in {hash}");
            return Ok(BurnCheck {
                from,
                ..BurnCheck::default()
            });
        };

        let check = match self.mint_decimals(&mint).await {
            Some(decimals) => self.target.evaluate(from, &mint, &raw_amount, decimals),
            None => self.target.undetermined(from, &mint),
        };
        info!(
            "Burn check for {hash}: token={mint} amount={:?} valid={}",
            check.amount, check.is_valid_burn
        );
        Ok(check)
    }
}
