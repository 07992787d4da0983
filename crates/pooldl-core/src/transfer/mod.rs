//! Transfer record: identity, status, byte counters and control flags of one download.
//!
//! All mutable fields live behind one mutex paired with a condition variable.
//! The lock is only held for field updates, never across I/O or sink callbacks,
//! so `query`/`pause`/`resume`/`cancel` never wait on a transfer's network or
//! disk activity. A paused worker sleeps on the condition variable, which
//! releases the lock while it waits.

mod snapshot;
mod status;

pub use snapshot::TransferSnapshot;
pub use status::TransferStatus;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use url::Url;

use crate::progress::Subscribers;

/// Opaque transfer identifier, unique within one `DownloadManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransferId(u64);

impl TransferId {
    pub fn from_raw(raw: u64) -> Self {
        TransferId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(TransferId)
    }
}

/// Result of a worker's check at a chunk boundary or wait point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    Proceed,
    Cancelled,
}

/// What `request_cancel` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CancelOutcome {
    /// Record was already terminal; nothing changed.
    AlreadyTerminal,
    /// Record had not been dispatched; it is now Cancelled and will never run.
    CancelledBeforeDispatch,
    /// A worker holds the record and will observe the flag.
    Signalled,
}

struct TransferState {
    status: TransferStatus,
    total_bytes: u64,
    downloaded_bytes: u64,
    pause_requested: bool,
    cancel_requested: bool,
    dispatched: bool,
}

pub struct Transfer {
    id: TransferId,
    source: Url,
    destination: PathBuf,
    state: Mutex<TransferState>,
    changed: Condvar,
    subscribers: Arc<Subscribers>,
}

impl Transfer {
    pub(crate) fn new(
        id: TransferId,
        source: Url,
        destination: PathBuf,
        subscribers: Arc<Subscribers>,
    ) -> Self {
        Self {
            id,
            source,
            destination,
            state: Mutex::new(TransferState {
                status: TransferStatus::Waiting,
                total_bytes: 0,
                downloaded_bytes: 0,
                pause_requested: false,
                cancel_requested: false,
                dispatched: false,
            }),
            changed: Condvar::new(),
            subscribers,
        }
    }

    pub fn id(&self) -> TransferId {
        self.id
    }

    pub fn source(&self) -> &Url {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    fn lock(&self) -> MutexGuard<'_, TransferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_of(&self, st: &TransferState) -> TransferSnapshot {
        TransferSnapshot {
            id: self.id,
            source: self.source.to_string(),
            destination: self.destination.clone(),
            status: st.status.clone(),
            downloaded_bytes: st.downloaded_bytes,
            total_bytes: st.total_bytes,
            pause_requested: st.pause_requested,
        }
    }

    pub fn snapshot(&self) -> TransferSnapshot {
        let st = self.lock();
        self.snapshot_of(&st)
    }

    pub fn status(&self) -> TransferStatus {
        self.lock().status.clone()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.lock().cancel_requested
    }

    /// Apply `next` under the lock. Returns the new snapshot, or `None` if the
    /// edge is not in the state machine. Caller must emit the snapshot after
    /// the guard is dropped.
    fn apply(&self, st: &mut TransferState, next: TransferStatus) -> Option<TransferSnapshot> {
        if !st.status.can_transition_to(&next) {
            tracing::warn!(id = %self.id, from = ?st.status, to = ?next, "refused illegal transition");
            return None;
        }
        tracing::debug!(id = %self.id, from = st.status.name(), to = next.name(), "transition");
        st.status = next;
        self.changed.notify_all();
        Some(self.snapshot_of(st))
    }

    fn emit(&self, snapshot: Option<TransferSnapshot>) -> bool {
        match snapshot {
            Some(s) => {
                self.subscribers.emit(&s);
                true
            }
            None => false,
        }
    }

    // ---- control side (any thread) ----

    /// Ask the worker to pause at its next chunk boundary.
    /// Returns false if already requested or the record is terminal.
    pub(crate) fn request_pause(&self) -> bool {
        let mut st = self.lock();
        if st.status.is_terminal() || st.pause_requested {
            return false;
        }
        st.pause_requested = true;
        true
    }

    /// Clear a pause request and wake the worker. Returns false if nothing was paused.
    pub(crate) fn request_resume(&self) -> bool {
        let mut st = self.lock();
        if !st.pause_requested {
            return false;
        }
        st.pause_requested = false;
        self.changed.notify_all();
        true
    }

    pub(crate) fn request_cancel(&self) -> CancelOutcome {
        let mut st = self.lock();
        if st.status.is_terminal() {
            return CancelOutcome::AlreadyTerminal;
        }
        st.cancel_requested = true;
        self.changed.notify_all();
        if st.dispatched {
            return CancelOutcome::Signalled;
        }
        let snapshot = self.apply(&mut st, TransferStatus::Cancelled);
        drop(st);
        self.emit(snapshot);
        CancelOutcome::CancelledBeforeDispatch
    }

    /// Block until the record is terminal or `timeout` elapses. Returns the
    /// last snapshot either way.
    pub(crate) fn wait_terminal(&self, timeout: Option<Duration>) -> TransferSnapshot {
        let st = self.lock();
        let st = match timeout {
            None => self
                .changed
                .wait_while(st, |s| !s.status.is_terminal())
                .unwrap_or_else(PoisonError::into_inner),
            Some(t) => {
                self.changed
                    .wait_timeout_while(st, t, |s| !s.status.is_terminal())
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
        };
        self.snapshot_of(&st)
    }

    // ---- worker side (the owning worker only) ----

    /// Take the record for execution. False if it was cancelled while queued.
    pub(crate) fn claim(&self) -> bool {
        let mut st = self.lock();
        if st.status.is_terminal() {
            return false;
        }
        st.dispatched = true;
        true
    }

    /// Record the negotiated size and enter Downloading, as one notification.
    pub(crate) fn begin(&self, total_bytes: u64) -> bool {
        let mut st = self.lock();
        if st.status != TransferStatus::Waiting {
            return false;
        }
        st.total_bytes = total_bytes;
        let snapshot = self.apply(&mut st, TransferStatus::Downloading);
        drop(st);
        self.emit(snapshot)
    }

    /// Chunk-boundary check. Cancellation wins over pause. When paused, sets
    /// status Paused and sleeps (lock released) until resumed or cancelled;
    /// on waking, cancellation is checked before resuming Downloading.
    pub(crate) fn checkpoint(&self) -> Gate {
        let mut st = self.lock();
        if st.cancel_requested {
            return Gate::Cancelled;
        }
        if !st.pause_requested {
            return Gate::Proceed;
        }
        let paused = self.apply(&mut st, TransferStatus::Paused);
        drop(st);
        self.emit(paused);
        tracing::info!(id = %self.id, "paused");

        let st = self.lock();
        let mut st = self
            .changed
            .wait_while(st, |s| s.pause_requested && !s.cancel_requested)
            .unwrap_or_else(PoisonError::into_inner);
        if st.cancel_requested {
            return Gate::Cancelled;
        }
        let resumed = self.apply(&mut st, TransferStatus::Downloading);
        drop(st);
        self.emit(resumed);
        tracing::info!(id = %self.id, "resumed");
        Gate::Proceed
    }

    /// Throttle delay between chunks. Returns early on cancellation.
    pub(crate) fn pace(&self, delay: Duration) -> Gate {
        if delay.is_zero() {
            return if self.is_cancel_requested() {
                Gate::Cancelled
            } else {
                Gate::Proceed
            };
        }
        let deadline = Instant::now() + delay;
        let mut st = self.lock();
        while !st.cancel_requested {
            let now = Instant::now();
            if now >= deadline {
                return Gate::Proceed;
            }
            st = self
                .changed
                .wait_timeout(st, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Gate::Cancelled
    }

    /// Count `n` more bytes written to the destination and notify.
    pub(crate) fn add_downloaded(&self, n: u64) {
        let mut st = self.lock();
        if st.status.is_terminal() {
            return;
        }
        st.downloaded_bytes += n;
        let snapshot = self.snapshot_of(&st);
        drop(st);
        self.subscribers.emit(&snapshot);
    }

    /// Move to a terminal status. No-op if already terminal.
    pub(crate) fn finish(&self, status: TransferStatus) -> bool {
        debug_assert!(status.is_terminal());
        let mut st = self.lock();
        let snapshot = self.apply(&mut st, status);
        drop(st);
        self.emit(snapshot)
    }
}

impl fmt::Debug for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transfer")
            .field("id", &self.id)
            .field("source", &self.source.as_str())
            .field("status", &self.status())
            .finish()
    }
}
