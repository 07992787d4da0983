//! Immutable view of a transfer handed to callers and progress sinks.

use std::path::PathBuf;

use super::{TransferId, TransferStatus};

/// Copy of a transfer's observable state at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSnapshot {
    pub id: TransferId,
    pub source: String,
    pub destination: PathBuf,
    pub status: TransferStatus,
    pub downloaded_bytes: u64,
    /// 0 while the size is unknown.
    pub total_bytes: u64,
    pub pause_requested: bool,
}

impl TransferSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Fraction complete in [0.0, 1.0]; 0.0 when the size is unknown.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.downloaded_bytes as f64 / self.total_bytes as f64).min(1.0)
    }

    /// Whole percent for a progress bar (integer division, like `downloaded * 100 / total`).
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 0;
        }
        (self.downloaded_bytes.saturating_mul(100) / self.total_bytes).min(100) as u8
    }
}
