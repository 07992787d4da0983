//! Progress notifications for presentation layers.
//!
//! Every status or byte-count change of a transfer is delivered once to each
//! subscribed `ProgressSink`, from the thread that made the change and after
//! the transfer's lock has been released. Sinks may call back into the
//! `DownloadManager` (e.g. `query`) without deadlocking.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use crate::transfer::{TransferId, TransferSnapshot};

/// Observer of transfer changes.
///
/// Called on worker threads (and on the caller's thread for a cancel before
/// dispatch). Implementations should return quickly; a slow sink throttles the
/// transfer that reports to it.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, id: TransferId, snapshot: &TransferSnapshot);
}

/// Owned notification, for channel-based sinks.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub id: TransferId,
    pub snapshot: TransferSnapshot,
}

impl<F> ProgressSink for F
where
    F: Fn(TransferId, &TransferSnapshot) + Send + Sync,
{
    fn on_progress(&self, id: TransferId, snapshot: &TransferSnapshot) {
        self(id, snapshot)
    }
}

/// Forwards to an async consumer. A closed receiver is ignored.
impl ProgressSink for tokio::sync::mpsc::UnboundedSender<ProgressEvent> {
    fn on_progress(&self, id: TransferId, snapshot: &TransferSnapshot) {
        let _ = self.send(ProgressEvent {
            id,
            snapshot: snapshot.clone(),
        });
    }
}

impl ProgressSink for std::sync::mpsc::Sender<ProgressEvent> {
    fn on_progress(&self, id: TransferId, snapshot: &TransferSnapshot) {
        let _ = self.send(ProgressEvent {
            id,
            snapshot: snapshot.clone(),
        });
    }
}

/// Subscriber list shared by the manager and all of its transfers.
#[derive(Default)]
pub(crate) struct Subscribers {
    sinks: RwLock<Vec<Arc<dyn ProgressSink>>>,
}

impl Subscribers {
    pub(crate) fn add(&self, sink: Arc<dyn ProgressSink>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    pub(crate) fn len(&self) -> usize {
        self.sinks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Deliver one snapshot to every sink. The list is copied first so a sink
    /// may subscribe further sinks from inside its callback. A panicking sink
    /// is logged and skipped; it never unwinds into the transfer or the pool.
    pub(crate) fn emit(&self, snapshot: &TransferSnapshot) {
        let sinks: Vec<Arc<dyn ProgressSink>> = self
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for sink in sinks {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
                sink.on_progress(snapshot.id, snapshot)
            }));
            if delivered.is_err() {
                tracing::error!(
                    id = %snapshot.id,
                    status = snapshot.status.name(),
                    "progress sink panicked"
                );
            }
        }
    }
}
