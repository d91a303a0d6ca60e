//! Configuration for burngate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Directory holding the ledger files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Ledger retention configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Burn proof verification.
    #[serde(default)]
    pub burn_verification: BurnVerificationConfig,

    /// Paging defaults and limits.
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Upstream providers.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Origins allowed by CORS. Empty allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

/// Ledger retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Days a used hash is remembered.
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// Hours between retention sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_hours: u64,

    /// Seconds after which an unfinished paired session is released.
    #[serde(default = "default_in_flight_timeout")]
    pub in_flight_timeout_secs: u64,
}

/// Burn proof verification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnVerificationConfig {
    /// Gate the listing endpoints behind a burn proof.
    #[serde(default)]
    pub enabled: bool,

    /// JSON-RPC endpoint used to fetch burn transactions.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Mint of the token that must be burned.
    #[serde(default)]
    pub target_contract_address: String,

    /// Exact amount (whole tokens) that must be burned.
    #[serde(default = "default_target_amount")]
    pub target_amount: String,

    /// Destination that counts as a burn.
    #[serde(default = "default_burn_address")]
    pub burn_address: String,

    /// Chain the burn transaction lives on.
    #[serde(default)]
    pub chain: BurnChain,

    /// Target used when `chain = "bsc"`.
    #[serde(default)]
    pub bsc: BscBurnConfig,
}

/// Chain a burn proof is checked on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BurnChain {
    /// Solana, SPL token transfer to the burn address.
    #[default]
    Sol,
    /// BNB Smart Chain, ERC-20 `Transfer` event to the burn address.
    Bsc,
}

impl std::fmt::Display for BurnChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Sol => "sol",
            Self::Bsc => "bsc",
        })
    }
}

impl std::str::FromStr for BurnChain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sol" | "solana" => Ok(Self::Sol),
            "bsc" => Ok(Self::Bsc),
            other => Err(format!("unknown burn chain {other:?}, expected sol or bsc")),
        }
    }
}

/// Burn target on BNB Smart Chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BscBurnConfig {
    /// Ethereum JSON-RPC endpoint.
    #[serde(default = "default_bsc_rpc_url")]
    pub rpc_url: String,

    /// ERC-20 contract of the token that must be burned.
    #[serde(default)]
    pub target_contract_address: String,

    /// Exact amount (whole tokens) that must be burned.
    #[serde(default = "default_target_amount")]
    pub target_amount: String,

    /// Destination that counts as a burn.
    #[serde(default = "default_bsc_burn_address")]
    pub burn_address: String,
}

/// Paging defaults and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page used when the request has none.
    #[serde(default = "default_page")]
    pub default_page: u32,

    /// Page size used when the request has none.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Largest page size accepted.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

/// One upstream provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderConfig {
    /// Whether the provider is used at all.
    pub enabled: bool,

    /// Rank in the failover order; lower goes first.
    pub priority: u32,

    /// API endpoints. Key-less providers rotate across them.
    pub api_urls: Vec<String>,

    /// API keys, rotated round-robin.
    pub api_keys: Vec<String>,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

/// All upstream providers.
///
/// A provider section in a file only overrides the fields it names; the
/// rest keep that provider's built-in values.
#[derive(Debug, Clone, Serialize)]
pub struct ProvidersConfig {
    /// QuickNode Solana RPC.
    pub quicknode: ProviderConfig,

    /// SolScan indexer.
    pub solscan: ProviderConfig,

    /// Shyft API.
    pub shyft: ProviderConfig,

    /// Public Solana RPC nodes.
    pub solnode: ProviderConfig,
}

/// Provider fields as written in a file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderOverrides {
    enabled: Option<bool>,
    priority: Option<u32>,
    api_urls: Option<Vec<String>>,
    api_keys: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

impl ProviderOverrides {
    fn apply(self, base: ProviderConfig) -> ProviderConfig {
        ProviderConfig {
            enabled: self.enabled.unwrap_or(base.enabled),
            priority: self.priority.unwrap_or(base.priority),
            api_urls: self.api_urls.unwrap_or(base.api_urls),
            api_keys: self.api_keys.unwrap_or(base.api_keys),
            timeout_secs: self.timeout_secs.unwrap_or(base.timeout_secs),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProvidersOverrides {
    quicknode: ProviderOverrides,
    solscan: ProviderOverrides,
    shyft: ProviderOverrides,
    solnode: ProviderOverrides,
}

impl<'de> Deserialize<'de> for ProvidersConfig {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let file = ProvidersOverrides::deserialize(deserializer)?;
        Ok(Self {
            quicknode: file.quicknode.apply(default_quicknode()),
            solscan: file.solscan.apply(default_solscan()),
            shyft: file.shyft.apply(default_shyft()),
            solnode: file.solnode.apply(default_solnode()),
        })
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            server: ServerConfig::default(),
            ledger: LedgerConfig::default(),
            burn_verification: BurnVerificationConfig::default(),
            pagination: PaginationConfig::default(),
            providers: ProvidersConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            sweep_interval_hours: default_sweep_interval(),
            in_flight_timeout_secs: default_in_flight_timeout(),
        }
    }
}

impl Default for BurnVerificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rpc_url: default_rpc_url(),
            target_contract_address: String::new(),
            target_amount: default_target_amount(),
            burn_address: default_burn_address(),
            chain: BurnChain::default(),
            bsc: BscBurnConfig::default(),
        }
    }
}

impl Default for BscBurnConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_bsc_rpc_url(),
            target_contract_address: String::new(),
            target_amount: default_target_amount(),
            burn_address: default_bsc_burn_address(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: default_page(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            quicknode: default_quicknode(),
            solscan: default_solscan(),
            shyft: default_shyft(),
            solnode: default_solnode(),
        }
    }
}

impl ProviderConfig {
    fn new(enabled: bool, priority: u32, api_urls: &[&str]) -> Self {
        Self {
            enabled,
            priority,
            api_urls: api_urls.iter().map(|url| (*url).to_string()).collect(),
            api_keys: Vec::new(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "burngate")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".burngate"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:8080".to_string()]
}

const fn default_retention_days() -> u64 {
    15
}

const fn default_sweep_interval() -> u64 {
    24 // daily
}

const fn default_in_flight_timeout() -> u64 {
    600 // 10 minutes
}

fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

fn default_target_amount() -> String {
    "101".to_string()
}

fn default_burn_address() -> String {
    "1nc1nerator11111111111111111111111111111111".to_string()
}

fn default_bsc_rpc_url() -> String {
    "https://bsc-dataseed1.binance.org".to_string()
}

fn default_bsc_burn_address() -> String {
    "0x000000000000000000000000000000000000dEaD".to_string()
}

const fn default_page() -> u32 {
    1
}

const fn default_page_size() -> u32 {
    50
}

const fn default_max_page_size() -> u32 {
    10_000
}

const fn default_provider_timeout() -> u64 {
    30
}

// QuickNode needs a private endpoint, so it ships disabled.
fn default_quicknode() -> ProviderConfig {
    ProviderConfig::new(false, 1, &[])
}

fn default_solscan() -> ProviderConfig {
    ProviderConfig::new(false, 2, &["https://public-api.solscan.io"])
}

fn default_shyft() -> ProviderConfig {
    ProviderConfig::new(false, 3, &["https://api.shyft.to/sol/v1"])
}

fn default_solnode() -> ProviderConfig {
    ProviderConfig::new(
        true,
        4,
        &[
            "https://api.mainnet-beta.solana.com",
            "https://rpc.ankr.com/solana",
        ],
    )
}

impl LedgerConfig {
    /// Retention window.
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(24 * 3600))
    }

    /// Interval between sweeps.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_hours.max(1).saturating_mul(3600))
    }

    /// Age after which an unfinished paired session is released.
    #[must_use]
    pub fn in_flight_timeout(&self) -> Duration {
        Duration::from_secs(self.in_flight_timeout_secs)
    }
}

impl PaginationConfig {
    /// Resolve a requested page and page size against the defaults and
    /// limits. Returns `(page, page_size)`.
    #[must_use]
    pub fn resolve(&self, page: Option<u32>, page_size: Option<u32>) -> (u32, u32) {
        let page = page.unwrap_or(self.default_page).max(1);
        let page_size = page_size
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1));
        (page, page_size)
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] describing the first problem found.
    pub fn validate(&self) -> crate::Result<()> {
        let burn = &self.burn_verification;
        if burn.enabled {
            let (section, contract, burn_address) = match burn.chain {
                BurnChain::Sol => (
                    "burn_verification",
                    &burn.target_contract_address,
                    &burn.burn_address,
                ),
                BurnChain::Bsc => (
                    "burn_verification.bsc",
                    &burn.bsc.target_contract_address,
                    &burn.bsc.burn_address,
                ),
            };
            if contract.is_empty() {
                return Err(crate::Error::Config(format!(
                    "{section}.target_contract_address is required when enabled"
                )));
            }
            if burn_address.is_empty() {
                return Err(crate::Error::Config(format!(
                    "{section}.burn_address is required when enabled"
                )));
            }
        }
        if self.pagination.max_page_size == 0 {
            return Err(crate::Error::Config(
                "pagination.max_page_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
