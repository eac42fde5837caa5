//! Error taxonomy for the relay engine
//!
//! The loop treats these classes differently: a rejected range is retried
//! without advancing the cursor, a per-event submission failure is logged and
//! skipped, and a connection failure at startup is fatal.

use thiserror::Error;

/// Failures reported by a [`ChainClient`](crate::chain::ChainClient)
#[derive(Debug, Error)]
pub enum ChainError {
    /// Could not reach the node (fatal at startup, retried on next use later)
    #[error("connection to {endpoint} failed: {reason}")]
    Connection { endpoint: String, reason: String },

    /// The node refused the requested block range (too large or beyond head)
    #[error("block range [{from}, {to}] rejected by node: {reason}")]
    RangeRejected { from: u64, to: u64, reason: String },

    /// Transient RPC failure
    #[error("node error during {operation}: {reason}")]
    Node {
        operation: &'static str,
        reason: String,
    },

    /// The network refused a signed transaction
    #[error("transaction rejected: {0}")]
    Submit(String),

    /// Local signing failed (bad key, incomplete payload)
    #[error("signing failed: {0}")]
    Signing(String),

    /// A log could not be decoded into a source event
    #[error("malformed log: {0}")]
    Decode(String),
}

impl ChainError {
    pub fn node(operation: &'static str, reason: impl ToString) -> Self {
        Self::Node {
            operation,
            reason: reason.to_string(),
        }
    }
}

/// Failure of one submission attempt; isolated to the event that caused it
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("nonce lookup failed: {0}")]
    Nonce(ChainError),

    #[error("gas price lookup failed: {0}")]
    GasPrice(ChainError),

    #[error("signing failed: {0}")]
    Signing(ChainError),

    #[error("submission failed: {0}")]
    Submit(ChainError),
}

impl SubmissionError {
    /// Short label used for metrics and log fields
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Nonce(_) => "nonce",
            Self::GasPrice(_) => "gas_price",
            Self::Signing(_) => "signing",
            Self::Submit(_) => "submit",
        }
    }
}

/// Cursor persistence failures
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cursor serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cursor database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cursor value {0} does not fit the store")]
    OutOfRange(u64),
}
