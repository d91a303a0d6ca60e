//! Solana JSON-RPC adapter, used for both QuickNode and the public node pool.

use super::normalize::{
    rpc_contract, rpc_token_account, rpc_transaction, RpcAccount, RpcKeyedAccount, RpcMintInfo,
    RpcSignatureInfo, RpcTokenAccountInfo, RpcTransaction, TransferRule,
};
use super::{
    ContractInfo, ListArgs, NormalizedTransaction, NormalizedTransfer, Provider, ProviderError,
};
use async_trait::async_trait;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// SPL Token program id.
pub const SPL_TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Transactions fetched concurrently per batch.
const TX_BATCH_SIZE: usize = 10;

/// Upper bound accepted by `getSignaturesForAddress`.
const MAX_SIGNATURES: u64 = 1000;

/// Deepest point of an address history a page may reach.
const MAX_HISTORY_DEPTH: u64 = 50_000;

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcContextValue<T> {
    value: T,
}

/// Minimal JSON-RPC 2.0 client over a shared `reqwest::Client`.
#[derive(Debug)]
pub(crate) struct JsonRpcClient {
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub(crate) fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            next_id: AtomicU64::new(1),
        }
    }

    /// Call `method` on `endpoint`. A `null` result is decoded as-is, so
    /// `T = Option<_>` accepts it.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        api_key: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<T, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("RPC {method} (id {id}) -> {endpoint}");

        let mut request = self.http.post(endpoint).json(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }));
        if let Some(key) = api_key {
            request = request.header("x-api-key", key);
        }

        let response: RpcResponse = request.send().await?.error_for_status()?.json().await?;
        if let Some(error) = response.error {
            return Err(ProviderError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        serde_json::from_value(response.result)
            .map_err(|e| ProviderError::Malformed(format!("{method}: {e}")))
    }
}

/// Solana JSON-RPC provider.
#[derive(Debug)]
pub struct RpcProvider {
    /// Fixed endpoint; `None` means the credential is the endpoint.
    endpoint: Option<String>,
    rpc: JsonRpcClient,
    rule: TransferRule,
}

impl RpcProvider {
    /// Provider with a fixed endpoint. The rotating credential is sent as
    /// the `x-api-key` header.
    pub fn with_api_key(
        endpoint: impl Into<String>,
        http: reqwest::Client,
        rule: TransferRule,
    ) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            rpc: JsonRpcClient::new(http),
            rule,
        }
    }

    /// Provider without keys whose rotating credential is the endpoint URL.
    #[must_use]
    pub fn rotating_endpoints(http: reqwest::Client, rule: TransferRule) -> Self {
        Self {
            endpoint: None,
            rpc: JsonRpcClient::new(http),
            rule,
        }
    }

    /// Signatures on the requested page, newest first.
    ///
    /// `getSignaturesForAddress` returns at most 1000 entries per call, so
    /// deeper pages walk the history with the `before` cursor until the end
    /// of the page or of the history.
    async fn page_signatures(
        &self,
        endpoint: &str,
        api_key: Option<&str>,
        args: &ListArgs,
    ) -> Result<Vec<RpcSignatureInfo>, ProviderError> {
        let offset = args.offset();
        let end = offset + u64::from(args.page_size);
        if end > MAX_HISTORY_DEPTH {
            return Err(ProviderError::Upstream(format!(
                "page {} reaches past the {MAX_HISTORY_DEPTH} most recent signatures",
                args.page
            )));
        }

        let mut page = Vec::new();
        let mut seen = 0u64;
        let mut before: Option<String> = None;
        while seen < end {
            let limit = (end - seen).min(MAX_SIGNATURES);
            let mut options = json!({ "limit": limit });
            if let Some(cursor) = &before {
                options["before"] = json!(cursor);
            }
            let batch: Vec<RpcSignatureInfo> = self
                .rpc
                .call(
                    endpoint,
                    api_key,
                    "getSignaturesForAddress",
                    json!([args.address, options]),
                )
                .await?;

            let fetched = batch.len() as u64;
            before = batch.last().map(|info| info.signature.clone());
            for info in batch {
                if seen >= offset && seen < end {
                    page.push(info);
                }
                seen += 1;
            }
            if fetched < limit || before.is_none() {
                break;
            }
        }
        Ok(page)
    }

    fn target<'a>(
        &'a self,
        credential: Option<&'a str>,
    ) -> Result<(&'a str, Option<&'a str>), ProviderError> {
        match &self.endpoint {
            Some(endpoint) => Ok((endpoint, credential)),
            None => credential
                .map(|endpoint| (endpoint, None))
                .ok_or_else(|| ProviderError::Upstream("no endpoint configured".into())),
        }
    }
}

#[async_trait]
impl Provider for RpcProvider {
    async fn transactions(
        &self,
        args: &ListArgs,
        credential: Option<&str>,
    ) -> Result<Vec<NormalizedTransaction>, ProviderError> {
        let (endpoint, api_key) = self.target(credential)?;

        let page = self.page_signatures(endpoint, api_key, args).await?;
        debug!("{} signatures on page {} for {}", page.len(), args.page, args.address);

        let mut transactions = Vec::with_capacity(page.len());
        for batch in page.chunks(TX_BATCH_SIZE) {
            let fetches = batch.iter().map(|info| {
                self.rpc.call::<Option<RpcTransaction>>(
                    endpoint,
                    api_key,
                    "getTransaction",
                    json!([
                        info.signature,
                        { "encoding": "json", "maxSupportedTransactionVersion": 0 }
                    ]),
                )
            });
            for (info, fetched) in batch.iter().zip(join_all(fetches).await) {
                match fetched? {
                    Some(tx) => {
                        let mut record = rpc_transaction(info.signature.clone(), &tx, self.rule);
                        record.slot = record.slot.or(info.slot);
                        record.block_time = record.block_time.or(info.block_time);
                        transactions.push(record);
                    }
                    None => debug!("Transaction {} not available, skipping", info.signature),
                }
            }
        }
        Ok(transactions)
    }

    async fn token_transfers(
        &self,
        args: &ListArgs,
        credential: Option<&str>,
    ) -> Result<Vec<NormalizedTransfer>, ProviderError> {
        let (endpoint, api_key) = self.target(credential)?;
        let accounts: RpcContextValue<Vec<RpcKeyedAccount<RpcTokenAccountInfo>>> = self
            .rpc
            .call(
                endpoint,
                api_key,
                "getTokenAccountsByOwner",
                json!([
                    args.address,
                    { "programId": SPL_TOKEN_PROGRAM },
                    { "encoding": "jsonParsed" }
                ]),
            )
            .await?;
        debug!(
            "{} token accounts owned by {}",
            accounts.value.len(),
            args.address
        );

        Ok(accounts
            .value
            .into_iter()
            .skip(usize::try_from(args.offset()).unwrap_or(usize::MAX))
            .take(args.page_size as usize)
            .map(|account| rpc_token_account(&args.address, account))
            .collect())
    }

    async fn contract_info(
        &self,
        address: &str,
        credential: Option<&str>,
    ) -> Result<ContractInfo, ProviderError> {
        let (endpoint, api_key) = self.target(credential)?;
        let account: RpcContextValue<Option<Value>> = self
            .rpc
            .call(
                endpoint,
                api_key,
                "getAccountInfo",
                json!([address, { "encoding": "jsonParsed" }]),
            )
            .await?;
        let value = account
            .value
            .ok_or_else(|| ProviderError::Upstream(format!("account {address} not found")))?;

        let parsed: RpcAccount<RpcMintInfo> = serde_json::from_value(value)
            .map_err(|e| ProviderError::Malformed(format!("{address} is not a parsed mint: {e}")))?;
        if parsed.data.parsed.kind.as_deref() != Some("mint") {
            return Err(ProviderError::Upstream(format!(
                "{address} is not a token mint"
            )));
        }
        let mut info = rpc_contract(address, parsed.data.parsed.info);

        let balance: Result<RpcContextValue<u64>, ProviderError> = self
            .rpc
            .call(endpoint, api_key, "getBalance", json!([address]))
            .await;
        match balance {
            Ok(balance) => info.balance_lamports = Some(balance.value),
            Err(e) => warn!("Could not read the balance of {address}: {e}"),
        }
        Ok(info)
    }
}
