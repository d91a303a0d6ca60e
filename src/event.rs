//! Gateway event system.

use tokio::sync::broadcast;

/// Events emitted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Gateway has started successfully.
    Started,

    /// Gateway is shutting down.
    ShuttingDown,

    /// A burn proof was verified and recorded.
    HashVerified {
        /// Normalized hash.
        hash: String,
    },

    /// A verified hash was locked for a paired query session.
    HashLocked {
        /// Normalized hash.
        hash: String,
    },

    /// A locked hash was released back to `verified` after a failure.
    HashReleased {
        /// Normalized hash.
        hash: String,
    },

    /// Both paired queries completed and the hash was consumed.
    HashConsumed {
        /// Normalized hash.
        hash: String,
    },

    /// One upstream provider failed and the next one is being tried.
    ProviderFailed {
        /// Provider name.
        provider: String,
        /// Failure description.
        reason: String,
    },

    /// No provider could answer a query.
    ProvidersExhausted {
        /// Operation name.
        operation: String,
    },

    /// A retention sweep finished.
    SweepCompleted {
        /// Records removed from the ledger and used-hash index.
        removed: usize,
        /// Abandoned locks released.
        released: usize,
    },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

/// Channel for receiving gateway events.
pub type GatewayEventsChannel = broadcast::Receiver<GatewayEvent>;

/// Sender for gateway events.
pub type GatewayEventsSender = broadcast::Sender<GatewayEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (GatewayEventsSender, GatewayEventsChannel) {
    broadcast::channel(256)
}

/// Send an event if a sender is attached. Having no subscribers is not an error.
pub(crate) fn emit(events: Option<&GatewayEventsSender>, event: GatewayEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
