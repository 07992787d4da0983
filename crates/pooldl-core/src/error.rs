//! Error taxonomy.
//!
//! `EngineError` is returned synchronously by `DownloadManager` operations.
//! `TransferError` never crosses a transfer boundary: the worker renders it
//! into the record's `Error(message)` status.

use thiserror::Error;

use crate::transfer::TransferId;

/// Errors returned to the caller of a manager operation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The locator could not be parsed or is not a fetchable HTTP(S) URL.
    #[error("invalid source {locator:?}: {reason}")]
    InvalidSource { locator: String, reason: String },

    #[error("no transfer with id {0}")]
    NotFound(TransferId),

    /// `remove` was called on a transfer that has not reached a terminal state.
    #[error("transfer {0} is still active")]
    NotTerminal(TransferId),

    #[error("download manager is shutting down")]
    ShuttingDown,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Failure of a single transfer. Terminal and local to its record.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Source unreachable, refused, or rejected the HEAD request.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// Final response of the GET had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),

    /// Transport failure while streaming the body.
    #[error("transport: {0}")]
    Transport(String),

    /// Destination read/write failure.
    #[error("storage: {0}")]
    Io(#[from] std::io::Error),

    /// Stream ended before the declared length was received.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },

    /// Source delivered more bytes than it declared.
    #[error("source sent more than the declared {expected} bytes")]
    Overrun { expected: u64 },

    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl From<curl::Error> for TransferError {
    fn from(e: curl::Error) -> Self {
        TransferError::Transport(e.to_string())
    }
}
