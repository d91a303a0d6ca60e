//! Test harness that runs a gateway against a mock upstream.
//!
//! The `TestGateway` binds the HTTP server to an ephemeral local port, points
//! every provider and the burn checker at a [`MockUpstream`] and keeps its
//! ledger in a temporary directory.

use super::upstream::{MockUpstream, BURN_ADDRESS, TARGET_MINT};
use burngate::config::GatewayConfig;
use burngate::event::GatewayEventsChannel;
use burngate::server::SESSION_HEADER;
use burngate::{GatewayBuilder, GatewayService};
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Error type for test harness operations.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Gateway error.
    #[error("Gateway error: {0}")]
    Gateway(#[from] burngate::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Gateway configuration pointing at `upstream`: SolScan first, the public
/// node pool second, burn checks over the same JSON-RPC endpoint.
pub fn gateway_config(upstream: &MockUpstream, data_dir: &Path, gating: bool) -> GatewayConfig {
    let mut config = GatewayConfig {
        data_dir: data_dir.to_path_buf(),
        ..GatewayConfig::default()
    };
    config.server.listen = "127.0.0.1:0".parse().unwrap_or(config.server.listen);
    config.server.cors_origins = Vec::new();

    config.burn_verification.enabled = gating;
    config.burn_verification.rpc_url = upstream.url();
    config.burn_verification.target_contract_address = TARGET_MINT.to_string();
    config.burn_verification.target_amount = "101".to_string();
    config.burn_verification.burn_address = BURN_ADDRESS.to_string();

    let providers = &mut config.providers;
    providers.quicknode.enabled = false;
    providers.shyft.enabled = false;
    providers.solscan.enabled = true;
    providers.solscan.api_urls = vec![upstream.url()];
    providers.solscan.api_keys = vec!["solscan-key".to_string()];
    providers.solscan.timeout_secs = 5;
    providers.solnode.enabled = true;
    providers.solnode.api_urls = vec![upstream.url()];
    providers.solnode.timeout_secs = 5;
    config
}

/// A gateway running in the background.
pub struct TestGateway {
    base_url: String,
    data_dir: PathBuf,
    service: Arc<GatewayService>,
    events: GatewayEventsChannel,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<burngate::Result<()>>,
}

impl TestGateway {
    /// Start a gateway from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway fails to build.
    pub async fn start(config: GatewayConfig) -> Result<Self> {
        let data_dir = config.data_dir.clone();
        let mut gateway = GatewayBuilder::new(config).build().await?;

        let base_url = format!("http://{}", gateway.local_addr());
        let service = gateway.service();
        let events = gateway.subscribe_events();
        let shutdown = gateway.shutdown_handle();
        let task = tokio::spawn(async move { gateway.run().await });
        info!("Test gateway running at {base_url}");

        Ok(Self {
            base_url,
            data_dir,
            service,
            events,
            shutdown,
            task,
        })
    }

    /// Start a gateway against `upstream` with its ledger in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway fails to build.
    pub async fn start_in(upstream: &MockUpstream, dir: &TempDir, gating: bool) -> Result<Self> {
        Self::start(gateway_config(upstream, dir.path(), gating)).await
    }

    /// The gateway operations, for inspecting gate state directly.
    pub fn service(&self) -> &GatewayService {
        &self.service
    }

    /// Gateway event receiver.
    pub fn events(&mut self) -> &mut GatewayEventsChannel {
        &mut self.events
    }

    /// Ledger directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Absolute URL of `path` on the gateway.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A new client with its own session.
    pub fn client(&self) -> TestClient {
        TestClient {
            http: reqwest::Client::new(),
            base_url: self.base_url.clone(),
            session_id: Mutex::new(None),
        }
    }

    /// Stop the gateway and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway ended with an error.
    pub async fn teardown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(result) => result?,
            Err(e) => return Err(std::io::Error::other(e.to_string()).into()),
        }
        Ok(())
    }
}

/// HTTP client that keeps the session id the gateway hands out.
pub struct TestClient {
    http: reqwest::Client,
    base_url: String,
    session_id: Mutex<Option<String>>,
}

impl TestClient {
    /// POST a JSON body. Returns the status and the decoded body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not JSON.
    pub async fn post(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        let request = self.http.post(format!("{}{path}", self.base_url)).json(&body);
        self.send(request).await
    }

    /// GET a route. Returns the status and the decoded body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not JSON.
    pub async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        let request = self.http.get(format!("{}{path}", self.base_url));
        self.send(request).await
    }

    /// Session id assigned by the gateway.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    async fn send(&self, mut request: reqwest::RequestBuilder) -> Result<(StatusCode, Value)> {
        if let Some(id) = self.session_id() {
            request = request.header(SESSION_HEADER, id);
        }
        let response = request.send().await?;
        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.lock() = Some(id.to_string());
        }
        let status = response.status();
        let body = response.json().await?;
        Ok((status, body))
    }
}
