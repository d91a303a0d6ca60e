//! SolScan REST indexer adapter.
//!
//! The credential is sent in the `token` header. Responses come wrapped in
//! `{ success, data }` or `{ success: false, message }`; a handful of
//! "nothing found" messages mean an empty result rather than a failure.

use super::normalize::{
    solscan_contract, SolscanHolderPage, SolscanTokenAccount, SolscanTokenMeta,
    SolscanTransaction,
};
use super::{
    ContractInfo, ListArgs, NormalizedTransaction, NormalizedTransfer, Provider, ProviderError,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Envelope messages that mean "no records" rather than an error.
const EMPTY_RESULT_MESSAGES: [&str; 2] = ["No transactions found", "No records found"];

/// Number of holders requested with contract info.
const HOLDER_LIMIT: u32 = 10;

/// SolScan adapter.
#[derive(Debug, Clone)]
pub struct SolscanProvider {
    base_url: String,
    http: reqwest::Client,
}

impl SolscanProvider {
    /// Create an adapter for the API rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    /// GET `path` and unwrap the envelope. `Ok(None)` means the upstream
    /// reported an empty result.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        credential: Option<&str>,
    ) -> Result<Option<T>, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        debug!("SolScan GET {url} {query:?}");

        let mut request = self
            .http
            .get(&url)
            .query(query)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = credential {
            request = request.header("token", token);
        }

        let body: Value = request.send().await?.error_for_status()?.json().await?;
        let Some(payload) = unwrap_envelope(body)? else {
            return Ok(None);
        };
        serde_json::from_value(payload)
            .map(Some)
            .map_err(|e| ProviderError::Malformed(format!("{path}: {e}")))
    }

    fn page_query(args: &ListArgs) -> Vec<(&'static str, String)> {
        vec![
            ("account", args.address.clone()),
            ("limit", args.page_size.to_string()),
            ("offset", args.offset().to_string()),
        ]
    }
}

fn unwrap_envelope(body: Value) -> Result<Option<Value>, ProviderError> {
    match body.get("success").and_then(Value::as_bool) {
        Some(false) => {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            if EMPTY_RESULT_MESSAGES.contains(&message) {
                Ok(None)
            } else {
                Err(ProviderError::Upstream(message.to_string()))
            }
        }
        Some(true) => match body {
            Value::Object(mut map) => Ok(map.remove("data").or(Some(Value::Object(map)))),
            other => Ok(Some(other)),
        },
        None => Ok(Some(body)),
    }
}

#[async_trait]
impl Provider for SolscanProvider {
    async fn transactions(
        &self,
        args: &ListArgs,
        credential: Option<&str>,
    ) -> Result<Vec<NormalizedTransaction>, ProviderError> {
        let records: Vec<SolscanTransaction> = self
            .get("/account/transactions", &Self::page_query(args), credential)
            .await?
            .unwrap_or_default();
        Ok(records.into_iter().map(NormalizedTransaction::from).collect())
    }

    async fn token_transfers(
        &self,
        args: &ListArgs,
        credential: Option<&str>,
    ) -> Result<Vec<NormalizedTransfer>, ProviderError> {
        let records: Vec<SolscanTokenAccount> = self
            .get("/account/tokens", &Self::page_query(args), credential)
            .await?
            .unwrap_or_default();
        Ok(records
            .into_iter()
            .map(|record| record.normalize(&args.address))
            .collect())
    }

    async fn contract_info(
        &self,
        address: &str,
        credential: Option<&str>,
    ) -> Result<ContractInfo, ProviderError> {
        let meta: SolscanTokenMeta = self
            .get(
                "/token/meta",
                &[("tokenAddress", address.to_string())],
                credential,
            )
            .await?
            .ok_or_else(|| ProviderError::Upstream(format!("token {address} not found")))?;

        let holders = match self
            .get::<SolscanHolderPage>(
                "/token/holders",
                &[
                    ("tokenAddress", address.to_string()),
                    ("limit", HOLDER_LIMIT.to_string()),
                ],
                credential,
            )
            .await
        {
            Ok(page) => page.map(SolscanHolderPage::into_holders).unwrap_or_default(),
            Err(e) => {
                warn!("SolScan holders lookup for {address} failed: {e}");
                Vec::new()
            }
        };

        Ok(solscan_contract(address, meta, holders))
    }
}
