//! Transfer status and its state machine.

use std::fmt;

/// Lifecycle state of one transfer.
///
/// ```text
/// Waiting ──► Downloading ◄──► Paused
///    │             │              │
///    └─────────────┴──────┬───────┘
///                         ▼
///          Completed | Cancelled | Error
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    Waiting,
    Downloading,
    Paused,
    Completed,
    Cancelled,
    Error(String),
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Cancelled | TransferStatus::Error(_)
        )
    }

    /// True while a worker holds the transfer (Downloading or Paused).
    pub fn is_active(&self) -> bool {
        matches!(self, TransferStatus::Downloading | TransferStatus::Paused)
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: &TransferStatus) -> bool {
        use TransferStatus::*;
        match (self, next) {
            (Completed | Cancelled | Error(_), _) => false,
            (_, Error(_)) | (_, Cancelled) => true,
            (Waiting, Downloading) => true,
            (Downloading, Paused) | (Paused, Downloading) => true,
            (Downloading, Completed) => true,
            _ => false,
        }
    }

    /// Short lowercase name, without the error message.
    pub fn name(&self) -> &'static str {
        match self {
            TransferStatus::Waiting => "waiting",
            TransferStatus::Downloading => "downloading",
            TransferStatus::Paused => "paused",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
            TransferStatus::Error(_) => "error",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Waiting => write!(f, "Waiting..."),
            TransferStatus::Downloading => write!(f, "Downloading"),
            TransferStatus::Paused => write!(f, "Paused"),
            TransferStatus::Completed => write!(f, "Completed"),
            TransferStatus::Cancelled => write!(f, "Cancelled"),
            TransferStatus::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}
