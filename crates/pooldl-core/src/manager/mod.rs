//! Download manager: owns the record table, admits submissions into the
//! worker pool and exposes the control operations.
//!
//! Control operations only touch a record's own lock; none of them wait on
//! network or disk activity.

mod pool;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Local;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fetch::{CurlFetcher, Fetcher};
use crate::progress::{ProgressSink, Subscribers};
use crate::transfer::{CancelOutcome, Transfer, TransferId, TransferSnapshot};
use crate::url_model;
use crate::worker::WorkerSettings;

use pool::{WorkQueue, WorkerPool};

pub struct DownloadManager {
    config: EngineConfig,
    table: RwLock<BTreeMap<TransferId, Arc<Transfer>>>,
    queue: Arc<WorkQueue>,
    subscribers: Arc<Subscribers>,
    next_id: AtomicU64,
    pool: Option<WorkerPool>,
}

impl DownloadManager {
    /// Start a manager fetching over HTTP(S) with libcurl.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(CurlFetcher::new(&config));
        Self::with_fetcher(config, fetcher)
    }

    /// Start a manager with a custom source implementation.
    pub fn with_fetcher(config: EngineConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, EngineError> {
        config.validate()?;
        let queue = Arc::new(WorkQueue::new());
        let settings = WorkerSettings {
            chunk_size: config.chunk_size,
            throttle: config.throttle(),
        };
        let pool = WorkerPool::spawn(config.pool_size, &queue, &fetcher, settings)?;
        tracing::info!(
            pool_size = config.pool_size,
            chunk_size = config.chunk_size,
            throttle_ms = config.throttle_ms,
            output_dir = %config.output_dir.display(),
            "download manager started"
        );
        Ok(Self {
            config,
            table: RwLock::new(BTreeMap::new()),
            queue,
            subscribers: Arc::new(Subscribers::default()),
            next_id: AtomicU64::new(1),
            pool: Some(pool),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate `source` and queue it. The new record starts Waiting.
    pub fn submit(&self, source: &str) -> Result<TransferId, EngineError> {
        if self.queue.is_closed() {
            return Err(EngineError::ShuttingDown);
        }
        let url = url_model::parse_source(source)?;
        let id = TransferId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let destination = url_model::destination_path(&self.config.output_dir, &url, id, Local::now());
        let transfer = Arc::new(Transfer::new(
            id,
            url,
            destination,
            Arc::clone(&self.subscribers),
        ));

        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&transfer));
        if let Err(e) = self.queue.push(Arc::clone(&transfer)) {
            // Closed between the check above and the push.
            self.table
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            return Err(e);
        }
        tracing::info!(
            %id,
            url = %transfer.source(),
            destination = %transfer.destination().display(),
            queued = self.queue.len(),
            "transfer submitted"
        );
        Ok(id)
    }

    fn get(&self, id: TransferId) -> Result<Arc<Transfer>, EngineError> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(EngineError::NotFound(id))
    }

    /// Request a pause at the next chunk boundary. No-op if already
    /// requested or terminal.
    pub fn pause(&self, id: TransferId) -> Result<(), EngineError> {
        if self.get(id)?.request_pause() {
            tracing::info!(%id, "pause requested");
        }
        Ok(())
    }

    pub fn resume(&self, id: TransferId) -> Result<(), EngineError> {
        if self.get(id)?.request_resume() {
            tracing::info!(%id, "resume requested");
        }
        Ok(())
    }

    /// Pause if not paused, otherwise resume. Returns the new pause flag.
    pub fn toggle_pause(&self, id: TransferId) -> Result<bool, EngineError> {
        let transfer = self.get(id)?;
        if transfer.request_pause() {
            tracing::info!(%id, "pause requested");
            return Ok(true);
        }
        if transfer.request_resume() {
            tracing::info!(%id, "resume requested");
            return Ok(false);
        }
        Ok(transfer.snapshot().pause_requested)
    }

    /// Request cancellation. A record still in the queue is cancelled on the
    /// spot; a running one stops within one chunk cycle.
    pub fn cancel(&self, id: TransferId) -> Result<(), EngineError> {
        match self.get(id)?.request_cancel() {
            CancelOutcome::AlreadyTerminal => {}
            CancelOutcome::CancelledBeforeDispatch => tracing::info!(%id, "cancelled while queued"),
            CancelOutcome::Signalled => tracing::info!(%id, "cancel requested"),
        }
        Ok(())
    }

    pub fn query(&self, id: TransferId) -> Result<TransferSnapshot, EngineError> {
        Ok(self.get(id)?.snapshot())
    }

    /// Every record in the table, in submission order.
    pub fn list(&self) -> Vec<TransferSnapshot> {
        self.records().iter().map(|t| t.snapshot()).collect()
    }

    fn records(&self) -> Vec<Arc<Transfer>> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Drop a terminal record from the table and return its last snapshot.
    pub fn remove(&self, id: TransferId) -> Result<TransferSnapshot, EngineError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let transfer = table.get(&id).ok_or(EngineError::NotFound(id))?;
        let snapshot = transfer.snapshot();
        if !snapshot.is_terminal() {
            return Err(EngineError::NotTerminal(id));
        }
        table.remove(&id);
        tracing::debug!(%id, "transfer removed");
        Ok(snapshot)
    }

    /// Register a sink for every subsequent change of every transfer.
    pub fn subscribe(&self, sink: Arc<dyn ProgressSink>) {
        self.subscribers.add(sink);
        tracing::debug!(sinks = self.subscribers.len(), "progress sink subscribed");
    }

    /// Block until `id` is terminal.
    pub fn wait(&self, id: TransferId) -> Result<TransferSnapshot, EngineError> {
        Ok(self.get(id)?.wait_terminal(None))
    }

    /// Like `wait`, giving up after `timeout`; the returned snapshot may then
    /// be non-terminal.
    pub fn wait_timeout(&self, id: TransferId, timeout: Duration) -> Result<TransferSnapshot, EngineError> {
        Ok(self.get(id)?.wait_terminal(Some(timeout)))
    }

    /// Block until every record present at the time of the call is terminal.
    pub fn wait_all(&self) -> Vec<TransferSnapshot> {
        self.records()
            .iter()
            .map(|t| t.wait_terminal(None))
            .collect()
    }

    /// Stop accepting submissions. Accepted transfers keep running.
    pub fn close(&self) {
        if !self.queue.is_closed() {
            tracing::info!("download manager closed to new submissions");
        }
        self.queue.close();
    }

    /// Refuse new work, let every accepted transfer finish, and join the pool.
    pub fn shutdown(mut self) {
        self.close();
        if let Some(pool) = self.pool.take() {
            pool.join();
        }
        tracing::info!("download manager shut down");
    }
}

impl Drop for DownloadManager {
    /// Without an explicit `shutdown`, outstanding work is cancelled rather
    /// than drained.
    fn drop(&mut self) {
        let Some(pool) = self.pool.take() else {
            return;
        };
        self.queue.close();
        for transfer in self.records() {
            transfer.request_cancel();
        }
        pool.join();
        tracing::debug!("download manager dropped");
    }
}
