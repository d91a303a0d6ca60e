//! Shyft REST adapter. Serves contract info only; listings fall through to
//! the next provider.

use super::normalize::{shyft_contract, ShyftTokenInfo};
use super::{ContractInfo, Provider, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const NETWORK: &str = "mainnet-beta";

#[derive(Debug, Deserialize)]
struct ShyftEnvelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    result: Option<T>,
}

/// Shyft adapter.
#[derive(Debug, Clone)]
pub struct ShyftProvider {
    base_url: String,
    http: reqwest::Client,
}

impl ShyftProvider {
    /// Create an adapter for the API rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }
}

#[async_trait]
impl Provider for ShyftProvider {
    async fn contract_info(
        &self,
        address: &str,
        credential: Option<&str>,
    ) -> Result<ContractInfo, ProviderError> {
        let Some(api_key) = credential else {
            return Err(ProviderError::Upstream("no api key configured".into()));
        };

        let url = format!("{}/token/get_info", self.base_url);
        debug!("Shyft GET {url} token_address={address}");
        let envelope: ShyftEnvelope<ShyftTokenInfo> = self
            .http
            .get(&url)
            .query(&[("network", NETWORK), ("token_address", address)])
            .header("x-api-key", api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match envelope {
            ShyftEnvelope {
                success: true,
                result: Some(info),
                ..
            } => Ok(shyft_contract(address, info)),
            ShyftEnvelope { message, .. } => Err(ProviderError::Upstream(
                message.unwrap_or_else(|| format!("no token info for {address}")),
            )),
        }
    }
}
