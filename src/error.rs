//! Error types for burngate.

use crate::burn::BurnError;
use crate::gate::GateError;
use crate::ledger::LedgerError;
use crate::provider::QueryError;
use thiserror::Error;

/// Result type alias using the crate error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for gateway operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Verification gate rejected the operation.
    #[error(transparent)]
    Gate(#[from] GateError),

    /// Every upstream provider failed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Burn proof could not be checked.
    #[error(transparent)]
    Burn(#[from] BurnError),

    /// Ledger persistence failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The session holds no verified burn proof.
    #[error("no verified burn transaction in this session, please verify one first")]
    NotVerified,

    /// Caller supplied an invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP server error.
    #[error("server error: {0}")]
    Server(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
