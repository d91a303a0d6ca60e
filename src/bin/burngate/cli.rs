//! Command-line interface definition.

use burngate::config::{BurnChain, GatewayConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Proof-of-burn gated blockchain query gateway.
#[derive(Parser, Debug)]
#[command(name = "burngate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, env = "BURNGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the ledger files.
    #[arg(long, env = "BURNGATE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// HTTP listen address.
    #[arg(long, short, env = "BURNGATE_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Allowed CORS origin (repeatable).
    #[arg(long = "cors-origin", env = "BURNGATE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Require a burn proof for listings.
    #[arg(long, env = "BURNGATE_BURN_VERIFICATION")]
    pub burn_verification: Option<bool>,

    /// Chain burn proofs are checked on (`sol` or `bsc`).
    #[arg(long, env = "BURNGATE_BURN_CHAIN")]
    pub burn_chain: Option<BurnChain>,

    /// Token that must be burned, on the burn chain.
    #[arg(long, env = "BURNGATE_TARGET_CONTRACT")]
    pub target_contract: Option<String>,

    /// Amount (whole tokens) that must be burned.
    #[arg(long, env = "BURNGATE_TARGET_AMOUNT")]
    pub target_amount: Option<String>,

    /// Burn destination address.
    #[arg(long, env = "BURNGATE_BURN_ADDRESS")]
    pub burn_address: Option<String>,

    /// JSON-RPC endpoint used for burn checks.
    #[arg(long, env = "BURNGATE_BURN_RPC_URL")]
    pub burn_rpc_url: Option<String>,

    /// Days a used hash is remembered.
    #[arg(long, env = "BURNGATE_RETENTION_DAYS")]
    pub retention_days: Option<u64>,

    /// QuickNode endpoint; enables the provider.
    #[arg(long, env = "BURNGATE_QUICKNODE_URL")]
    pub quicknode_url: Option<String>,

    /// QuickNode API keys.
    #[arg(long, env = "BURNGATE_QUICKNODE_KEYS", value_delimiter = ',')]
    pub quicknode_keys: Vec<String>,

    /// SolScan API keys; enables the provider.
    #[arg(long, env = "BURNGATE_SOLSCAN_KEYS", value_delimiter = ',')]
    pub solscan_keys: Vec<String>,

    /// Shyft API keys; enables the provider.
    #[arg(long, env = "BURNGATE_SHYFT_KEYS", value_delimiter = ',')]
    pub shyft_keys: Vec<String>,

    /// Log level.
    #[arg(long, env = "BURNGATE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "BURNGATE_JSON_LOGS")]
    pub json_logs: bool,

    /// Write the effective configuration to this path and exit.
    #[arg(long)]
    pub write_config: Option<PathBuf>,
}

impl Cli {
    /// Convert CLI arguments into a `GatewayConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_config(self) -> color_eyre::Result<GatewayConfig> {
        let mut config = if let Some(ref path) = self.config {
            GatewayConfig::from_file(path)?
        } else {
            GatewayConfig::default()
        };

        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if !self.cors_origins.is_empty() {
            config.server.cors_origins = self.cors_origins;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        let burn = &mut config.burn_verification;
        if let Some(enabled) = self.burn_verification {
            burn.enabled = enabled;
        }
        if let Some(chain) = self.burn_chain {
            burn.chain = chain;
        }
        // Target overrides apply to the section of the active chain.
        let (contract, amount, address, url) = match burn.chain {
            BurnChain::Sol => (
                &mut burn.target_contract_address,
                &mut burn.target_amount,
                &mut burn.burn_address,
                &mut burn.rpc_url,
            ),
            BurnChain::Bsc => (
                &mut burn.bsc.target_contract_address,
                &mut burn.bsc.target_amount,
                &mut burn.bsc.burn_address,
                &mut burn.bsc.rpc_url,
            ),
        };
        if let Some(value) = self.target_contract {
            *contract = value;
        }
        if let Some(value) = self.target_amount {
            *amount = value;
        }
        if let Some(value) = self.burn_address {
            *address = value;
        }
        if let Some(value) = self.burn_rpc_url {
            *url = value;
        }

        if let Some(days) = self.retention_days {
            config.ledger.retention_days = days;
        }

        let providers = &mut config.providers;
        if let Some(url) = self.quicknode_url {
            providers.quicknode.enabled = true;
            providers.quicknode.api_urls = vec![url];
        }
        if !self.quicknode_keys.is_empty() {
            providers.quicknode.api_keys = self.quicknode_keys;
        }
        if !self.solscan_keys.is_empty() {
            providers.solscan.enabled = true;
            providers.solscan.api_keys = self.solscan_keys;
        }
        if !self.shyft_keys.is_empty() {
            providers.shyft.enabled = true;
            providers.shyft.api_keys = self.shyft_keys;
        }

        Ok(config)
    }
}
