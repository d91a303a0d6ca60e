//! # burngate
//!
//! A gateway that serves blockchain transaction and token-transfer queries
//! behind a one-time proof-of-burn.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      HTTP (axum)                         │
//! ├──────────────────────────────────────────────────────────┤
//! │                    GatewayService                        │
//! ├──────────────┬──────────────────┬────────────────────────┤
//! │ BurnChecker  │ VerificationGate │   QueryOrchestrator    │
//! │  (JSON-RPC)  │  (state machine) │  (priority failover)   │
//! ├──────────────┼──────────────────┼────────────────────────┤
//! │              │   Hash ledger    │ quicknode · solscan ·  │
//! │              │ (JSON files)     │ shyft · solnode        │
//! └──────────────┴──────────────────┴────────────────────────┘
//! ```
//!
//! A verified burn proof buys one session of two paired listing calls. The
//! proof is locked while the session runs, consumed once both calls succeed
//! and released if either fails. Queries go to the highest-priority upstream
//! provider first and fail over to the next on any error or timeout.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod burn;
pub mod config;
pub mod error;
pub mod event;
pub mod gate;
pub mod gateway;
pub mod ledger;
pub mod provider;
pub mod server;
pub mod service;
pub mod sweep;

pub use burn::{BscBurnChecker, BurnCheck, BurnChecker, BurnError, BurnTarget, RpcBurnChecker};
pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use event::{GatewayEvent, GatewayEventsChannel};
pub use gate::{GateError, SubPath, TokenStatus, VerificationGate};
pub use gateway::{GatewayBuilder, RunningGateway};
pub use ledger::{FileStore, HashStore, MemoryStore, NormalizedHash};
pub use provider::{Provider, ProviderRegistry, QueryError, QueryOrchestrator};
pub use service::{BurnRequirement, GatewayService, PublicConfig, Session};
pub use sweep::{SweepReport, Sweeper};
