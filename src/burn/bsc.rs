//! Burn proofs on BNB Smart Chain.

use super::{BurnCheck, BurnChecker, BurnError, BurnTarget};
use crate::config::BscBurnConfig;
use crate::provider::rpc::JsonRpcClient;
use crate::provider::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// `keccak256("Transfer(address,address,uint256)")`.
const TRANSFER_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// Selector of ERC-20 `decimals()`.
const DECIMALS_SELECTOR: &str = "0x313ce567";

#[derive(Debug, Deserialize)]
struct Receipt {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    logs: Vec<Log>,
}

#[derive(Debug, Deserialize)]
struct Log {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct Transaction {
    #[serde(default)]
    from: Option<String>,
}

/// Burn checker backed by an Ethereum-compatible JSON-RPC endpoint.
///
/// A burn is an ERC-20 `Transfer` event whose recipient is the burn
/// address. When several such events appear, the first valid one wins;
/// otherwise the last one found is reported.
#[derive(Debug)]
pub struct BscBurnChecker {
    rpc_url: String,
    rpc: JsonRpcClient,
    target: BurnTarget,
}

impl BscBurnChecker {
    /// Create a checker querying `rpc_url`.
    pub fn new(rpc_url: impl Into<String>, http: reqwest::Client, target: BurnTarget) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            rpc: JsonRpcClient::new(http),
            target,
        }
    }

    /// Build a checker from the BNB Smart Chain section.
    #[must_use]
    pub fn from_config(config: &BscBurnConfig, http: reqwest::Client) -> Self {
        Self::new(
            config.rpc_url.clone(),
            http,
            BurnTarget::from_bsc_config(config),
        )
    }

    async fn sender(&self, hash: &str) -> Result<Option<String>, ProviderError> {
        let tx: Option<Transaction> = self
            .rpc
            .call(&self.rpc_url, None, "eth_getTransactionByHash", json!([hash]))
            .await?;
        Ok(tx.and_then(|tx| tx.from))
    }

    async fn token_decimals(&self, token: &str) -> Option<u8> {
        let result: Result<String, ProviderError> = self
            .rpc
            .call(
                &self.rpc_url,
                None,
                "eth_call",
                json!([{ "to": token, "data": DECIMALS_SELECTOR }, "latest"]),
            )
            .await;
        match result {
            Ok(word) => {
                let decimals = hex_to_decimal(&word).and_then(|d| d.parse::<u8>().ok());
                if decimals.is_none() {
                    warn!("{token} returned unusable decimals {word:?}");
                }
                decimals
            }
            Err(e) => {
                warn!("Could not read decimals of {token}: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl BurnChecker for BscBurnChecker {
    async fn check(&self, hash: &str) -> Result<BurnCheck, BurnError> {
        let hash = hash.trim();
        if hash.is_empty() {
            return Err(BurnError::EmptyHash);
        }

        let hash = if hash.starts_with("0x") || hash.starts_with("0X") {
            hash.to_string()
        } else {
            format!("0x{hash}")
        };
        let hash = hash.as_str();

        let receipt: Option<Receipt> = self
            .rpc
            .call(&self.rpc_url, None, "eth_getTransactionReceipt", json!([hash]))
            .await?;
        let receipt = receipt.ok_or_else(|| BurnError::NotFound(hash.to_string()))?;
        if receipt.status.as_deref().and_then(hex_to_decimal).as_deref() == Some("0") {
            return Err(BurnError::Failed(hash.to_string()));
        }

        let from = match receipt.from.clone() {
            Some(from) => Some(from),
            None => self.sender(hash).await?,
        };

        let mut last = None;
        for (token, raw_amount) in burn_transfers(&receipt.logs, &self.target.burn_address) {
            let check = match (self.token_decimals(&token).await, raw_amount) {
                (Some(decimals), Some(raw)) => {
                    self.target.evaluate(from.clone(), &token, &raw, decimals)
                }
                _ => self.target.undetermined(from.clone(), &token),
            };
            if check.is_valid_burn {
                info!("Burn check for {hash}: token={token} amount={:?} valid", check.amount);
                return Ok(check);
            }
            last = Some(check);
        }

        match last {
            Some(check) => {
                info!(
                    "Burn check for {hash}: token={:?} amount={:?} valid=false",
                    check.token, check.amount
                );
                Ok(check)
            }
            None => {
                debug!("No transfer to the burn address in {hash}");
                Ok(BurnCheck {
                    from,
                    ..BurnCheck::default()
                })
            }
        }
    }
}

/// `(token, raw_amount)` of every `Transfer` event sent to `burn_address`.
///
/// The amount is `None` when the event data does not fit in 128 bits.
fn burn_transfers(logs: &[Log], burn_address: &str) -> Vec<(String, Option<String>)> {
    logs.iter()
        .filter(|log| {
            log.topics.len() >= 3
                && log.topics[0].eq_ignore_ascii_case(TRANSFER_TOPIC)
                && topic_address(&log.topics[2])
                    .is_some_and(|to| to.eq_ignore_ascii_case(burn_address))
        })
        .map(|log| (log.address.clone(), hex_to_decimal(&log.data)))
        .collect()
}

/// The address held in the low 20 bytes of an indexed topic.
fn topic_address(topic: &str) -> Option<String> {
    let hex = topic.strip_prefix("0x").unwrap_or(topic);
    if hex.len() != 64 || !hex.is_ascii() {
        return None;
    }
    Some(format!("0x{}", &hex[24..]))
}

/// Decimal text of a `0x`-prefixed big-endian word, up to `u128::MAX`.
fn hex_to_decimal(word: &str) -> Option<String> {
    let hex = word.strip_prefix("0x").unwrap_or(word);
    let digits = hex.trim_start_matches('0');
    if digits.is_empty() {
        return hex
            .bytes()
            .all(|b| b == b'0')
            .then(|| "0".to_string());
    }
    if digits.len() > 32 {
        return None;
    }
    u128::from_str_radix(digits, 16).ok().map(|n| n.to_string())
}
