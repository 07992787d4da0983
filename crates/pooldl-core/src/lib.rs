pub mod config;
pub mod logging;

pub mod error;
pub mod fetch;
pub mod manager;
pub mod progress;
pub mod storage;
pub mod transfer;
pub mod url_model;
mod worker;

pub use error::{EngineError, TransferError};
pub use manager::DownloadManager;
pub use progress::{ProgressEvent, ProgressSink};
pub use transfer::{TransferId, TransferSnapshot, TransferStatus};
