//! FIFO admission queue and the fixed set of threads that drain it.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::error::EngineError;
use crate::fetch::Fetcher;
use crate::transfer::Transfer;
use crate::worker::{self, WorkerSettings};

struct QueueState {
    pending: VecDeque<Arc<Transfer>>,
    closed: bool,
}

/// Records waiting for a worker, in submission order.
pub(crate) struct WorkQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl WorkQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, transfer: Arc<Transfer>) -> Result<(), EngineError> {
        let mut st = self.lock();
        if st.closed {
            return Err(EngineError::ShuttingDown);
        }
        st.pending.push_back(transfer);
        self.ready.notify_one();
        Ok(())
    }

    /// Next record, blocking while the queue is open and empty. `None` once
    /// the queue is closed and drained.
    pub(crate) fn pop(&self) -> Option<Arc<Transfer>> {
        let st = self.lock();
        let mut st = self
            .ready
            .wait_while(st, |s| s.pending.is_empty() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        st.pending.pop_front()
    }

    /// Refuse further pushes. Already queued records are still handed out.
    pub(crate) fn close(&self) {
        let mut st = self.lock();
        st.closed = true;
        self.ready.notify_all();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().pending.len()
    }
}

/// `pool_size` named threads, each running one transfer at a time.
pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn spawn(
        size: usize,
        queue: &Arc<WorkQueue>,
        fetcher: &Arc<dyn Fetcher>,
        settings: WorkerSettings,
    ) -> Result<Self, EngineError> {
        let mut pool = WorkerPool {
            handles: Vec::with_capacity(size),
        };
        for slot in 0..size {
            let work = Arc::clone(queue);
            let fetcher = Arc::clone(fetcher);
            let spawned = thread::Builder::new()
                .name(format!("pooldl-worker-{}", slot))
                .spawn(move || {
                    while let Some(transfer) = work.pop() {
                        worker::run(&transfer, fetcher.as_ref(), settings);
                    }
                    tracing::trace!(slot, "worker exiting");
                });
            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    queue.close();
                    pool.join();
                    return Err(EngineError::Spawn(e));
                }
            }
        }
        tracing::debug!(size, "worker pool started");
        Ok(pool)
    }

    /// Wait for every thread to exit. The queue must be closed first.
    pub(crate) fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked outside a transfer");
            }
        }
    }
}
