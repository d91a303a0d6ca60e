//! Gateway assembly: wires the ledger, gate, providers, burn checker,
//! service, sweeper and HTTP server together.

use crate::burn::{BscBurnChecker, BurnChecker, RpcBurnChecker};
use crate::config::{BurnChain, GatewayConfig};
use crate::error::{Error, Result};
use crate::event::{create_event_channel, GatewayEvent, GatewayEventsChannel, GatewayEventsSender};
use crate::gate::VerificationGate;
use crate::ledger::{FileStore, HashStore};
use crate::provider::{ProviderRegistry, QueryOrchestrator};
use crate::server::{self, AppState};
use crate::service::{BurnRequirement, GatewayService};
use crate::sweep::Sweeper;
use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// User agent sent to upstream providers.
const USER_AGENT: &str = concat!("burngate/", env!("CARGO_PKG_VERSION"));

/// Builder for a gateway.
pub struct GatewayBuilder {
    config: GatewayConfig,
    store: Option<Arc<dyn HashStore>>,
    checker: Option<Arc<dyn BurnChecker>>,
    registry: Option<ProviderRegistry>,
}

impl GatewayBuilder {
    /// Create a builder with the given configuration.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            store: None,
            checker: None,
            registry: None,
        }
    }

    /// Use `store` instead of the file ledger under `data_dir`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn HashStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `checker` instead of the JSON-RPC burn checker.
    #[must_use]
    pub fn with_burn_checker(mut self, checker: Arc<dyn BurnChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    /// Use `registry` instead of the configured providers.
    #[must_use]
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the gateway and bind its listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the ledger cannot be
    /// opened or the listen address cannot be bound.
    pub async fn build(self) -> Result<RunningGateway> {
        let config = self.config;
        config.validate()?;
        info!(
            "Building burngate (listen {}, gating {})",
            config.server.listen, config.burn_verification.enabled
        );

        let store = match self.store {
            Some(store) => store,
            None => {
                std::fs::create_dir_all(&config.data_dir)?;
                Arc::new(FileStore::open(&config.data_dir)?) as Arc<dyn HashStore>
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = create_event_channel();

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        let registry = self
            .registry
            .unwrap_or_else(|| ProviderRegistry::from_config(&config.providers, &http));
        let burn = &config.burn_verification;
        let checker: Arc<dyn BurnChecker> = match self.checker {
            Some(checker) => checker,
            None => match burn.chain {
                BurnChain::Sol => Arc::new(RpcBurnChecker::from_config(burn, http.clone())),
                BurnChain::Bsc => Arc::new(BscBurnChecker::from_config(&burn.bsc, http.clone())),
            },
        };
        info!("Burn proofs are checked on {}", burn.chain);

        let gate = Arc::new(VerificationGate::new(store).with_events(events_tx.clone()));
        let orchestrator =
            Arc::new(QueryOrchestrator::new(registry).with_events(events_tx.clone()));
        let service = Arc::new(
            GatewayService::new(
                Arc::clone(&gate),
                orchestrator,
                checker,
                config.burn_verification.enabled,
            )
            .with_pagination(config.pagination.clone())
            .with_burn_requirement(BurnRequirement::from_config(&config.burn_verification)),
        );
        if !service.gating() {
            warn!("Burn verification disabled, listings are served without a proof");
        }

        let sweeper = Sweeper::new(gate, &config.ledger).with_events(events_tx.clone());
        let app = server::router(
            AppState::new(Arc::clone(&service)),
            &config.server.cors_origins,
        );

        let listener = TcpListener::bind(config.server.listen).await?;
        let local_addr = listener.local_addr()?;

        Ok(RunningGateway {
            config,
            local_addr,
            listener: Some(listener),
            app,
            service,
            sweeper: Some(sweeper),
            shutdown_tx,
            shutdown_rx,
            events_tx,
            events_rx: Some(events_rx),
        })
    }
}

/// A built gateway, ready to run.
pub struct RunningGateway {
    config: GatewayConfig,
    local_addr: SocketAddr,
    listener: Option<TcpListener>,
    app: Router,
    service: Arc<GatewayService>,
    sweeper: Option<Sweeper>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: GatewayEventsSender,
    events_rx: Option<GatewayEventsChannel>,
}

impl RunningGateway {
    /// Address the HTTP server is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Directory holding the ledger files.
    #[must_use]
    pub fn data_dir(&self) -> &PathBuf {
        &self.config.data_dir
    }

    /// The gateway operations.
    #[must_use]
    pub fn service(&self) -> Arc<GatewayService> {
        Arc::clone(&self.service)
    }

    /// Get a receiver for gateway events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<GatewayEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to gateway events.
    #[must_use]
    pub fn subscribe_events(&self) -> GatewayEventsChannel {
        self.events_tx.subscribe()
    }

    /// Handle that stops the gateway when sent `true`.
    #[must_use]
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Serve until shutdown is requested or Ctrl-C is received.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway was already run or the server fails.
    pub async fn run(&mut self) -> Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| Error::Server("gateway already ran".into()))?;

        info!("Starting burngate on {}", self.local_addr);
        let _ = self.events_tx.send(GatewayEvent::Started);

        let sweeper_task = self
            .sweeper
            .take()
            .map(|sweeper| tokio::spawn(sweeper.run(self.shutdown_rx.clone())));

        let shutdown_tx = self.shutdown_tx.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();
        let shutdown = async move {
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Shutdown signal received");
                            break;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Ctrl-C received, initiating shutdown");
                        let _ = shutdown_tx.send(true);
                        break;
                    }
                }
            }
        };

        let served = server::serve(listener, self.app.clone(), shutdown).await;

        self.shutdown();
        if let Some(task) = sweeper_task {
            if let Err(e) = task.await {
                warn!("Sweeper task ended abnormally: {e}");
            }
        }

        let _ = self.events_tx.send(GatewayEvent::ShuttingDown);
        info!("Gateway shutdown complete");
        served
    }

    /// Request the gateway to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
