//! Retention sweeper.
//!
//! Runs once at startup and then on a fixed interval. Each pass drops used
//! records older than the retention window and releases locks whose paired
//! session was abandoned.

use crate::config::LedgerConfig;
use crate::event::{emit, GatewayEvent, GatewayEventsSender};
use crate::gate::VerificationGate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records removed from the ledger and used-hash index.
    pub removed: usize,
    /// Abandoned locks released.
    pub released: usize,
}

/// Periodic ledger maintenance.
pub struct Sweeper {
    gate: Arc<VerificationGate>,
    retention: Duration,
    in_flight_timeout: Duration,
    interval: Duration,
    events: Option<GatewayEventsSender>,
}

impl Sweeper {
    /// Create a sweeper using the ledger settings.
    #[must_use]
    pub fn new(gate: Arc<VerificationGate>, config: &LedgerConfig) -> Self {
        Self {
            gate,
            retention: config.retention(),
            in_flight_timeout: config.in_flight_timeout(),
            interval: config.sweep_interval(),
            events: None,
        }
    }

    /// Emit `SweepCompleted` events on `events`.
    #[must_use]
    pub fn with_events(mut self, events: GatewayEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Interval between sweeps.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep now.
    pub fn sweep_once(&self) -> SweepReport {
        let removed = match self.gate.expire(self.retention) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Retention sweep could not persist the ledger: {e}");
                emit(
                    self.events.as_ref(),
                    GatewayEvent::Error {
                        message: format!("retention sweep failed: {e}"),
                    },
                );
                0
            }
        };
        let released = self.gate.release_stale(self.in_flight_timeout).len();

        let report = SweepReport { removed, released };
        if removed > 0 || released > 0 {
            info!("Sweep removed {removed} expired records, released {released} locks");
        } else {
            debug!("Sweep found nothing to do");
        }
        emit(
            self.events.as_ref(),
            GatewayEvent::SweepCompleted { removed, released },
        );
        report
    }

    /// Sweep immediately, then every interval until `shutdown_rx` turns true.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        info!("Ledger sweeper running every {:?}", self.interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        debug!("Sweeper stopping");
                        break;
                    }
                }
                // The first tick completes immediately.
                _ = ticker.tick() => {
                    self.sweep_once();
                }
            }
        }
    }
}
