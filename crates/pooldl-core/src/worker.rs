//! Transfer worker: drives one record from dispatch to a terminal state.
//!
//! negotiate → Downloading → chunk loop (cancel / pause / write / notify / pace)
//! → finalize. Every failure ends in `Error(message)` on the record; nothing
//! escapes to the pool, including panics.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use crate::error::TransferError;
use crate::fetch::{Fetcher, Flow, StreamEnd};
use crate::storage::{self, StorageWriter, StorageWriterBuilder};
use crate::transfer::{Gate, Transfer, TransferStatus};

/// Per-transfer knobs taken from `EngineConfig`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerSettings {
    pub chunk_size: usize,
    pub throttle: Duration,
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Completed,
    Cancelled,
}

/// Execute `transfer` on the current thread. Returns once it is terminal.
pub(crate) fn run(transfer: &Transfer, fetcher: &dyn Fetcher, settings: WorkerSettings) {
    if !transfer.claim() {
        tracing::debug!(id = %transfer.id(), "skipping transfer cancelled while queued");
        return;
    }
    tracing::info!(id = %transfer.id(), url = %transfer.source(), "transfer started");

    let result = panic::catch_unwind(AssertUnwindSafe(|| execute(transfer, fetcher, settings)))
        .unwrap_or_else(|payload| Err(TransferError::Panicked(panic_message(payload))));

    let final_status = match result {
        Ok(Outcome::Completed) => TransferStatus::Completed,
        Ok(Outcome::Cancelled) => TransferStatus::Cancelled,
        Err(e) => {
            tracing::warn!(id = %transfer.id(), url = %transfer.source(), "transfer failed: {}", e);
            TransferStatus::Error(e.to_string())
        }
    };
    if final_status != TransferStatus::Completed {
        // Also covers a panic that unwound past the writer without discarding it.
        storage::remove_temp(transfer.destination());
    }
    transfer.finish(final_status);

    let snap = transfer.snapshot();
    tracing::info!(
        id = %snap.id,
        status = snap.status.name(),
        bytes = snap.downloaded_bytes,
        "transfer finished"
    );
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn execute(
    transfer: &Transfer,
    fetcher: &dyn Fetcher,
    settings: WorkerSettings,
) -> Result<Outcome, TransferError> {
    let interrupted = || transfer.is_cancel_requested();

    let negotiated = fetcher.negotiate(transfer.source(), &interrupted);
    if transfer.is_cancel_requested() {
        return Ok(Outcome::Cancelled);
    }
    let total = negotiated?.content_length.unwrap_or(0);
    if !transfer.begin(total) {
        // Only a concurrent cancel can move a claimed record off Waiting.
        return Ok(Outcome::Cancelled);
    }
    tracing::debug!(id = %transfer.id(), total, "negotiated");

    let temp = storage::temp_path(transfer.destination());
    let mut builder = StorageWriterBuilder::create(&temp)?;
    if total > 0 {
        if let Err(e) = builder.preallocate(total) {
            builder.build().discard();
            return Err(e.into());
        }
    }
    let mut writer = builder.build();
    tracing::debug!(id = %transfer.id(), path = %writer.temp_path().display(), "writing");

    match pump(transfer, fetcher, settings, &mut writer, total) {
        Ok(Outcome::Completed) if !transfer.is_cancel_requested() => {
            writer.finalize(transfer.destination())?;
            Ok(Outcome::Completed)
        }
        Ok(_) => {
            writer.discard();
            Ok(Outcome::Cancelled)
        }
        Err(e) => {
            writer.discard();
            Err(e)
        }
    }
}

/// The chunk loop. The fetcher's buffers are split into `chunk_size` pieces;
/// each piece passes the cancel/pause checkpoint before it is written, so a
/// piece in hand when cancellation is observed is dropped unwritten.
fn pump(
    transfer: &Transfer,
    fetcher: &dyn Fetcher,
    settings: WorkerSettings,
    writer: &mut StorageWriter,
    total: u64,
) -> Result<Outcome, TransferError> {
    let interrupted = || transfer.is_cancel_requested();
    let chunk_size = settings.chunk_size.max(1);
    let mut failure: Option<TransferError> = None;
    let mut cancelled = false;

    let streamed = fetcher.stream(transfer.source(), &interrupted, &mut |data: &[u8]| {
        for chunk in data.chunks(chunk_size) {
            if transfer.checkpoint() == Gate::Cancelled {
                cancelled = true;
                return Flow::Stop;
            }
            let len = chunk.len() as u64;
            if total > 0 && writer.written() + len > total {
                failure = Some(TransferError::Overrun { expected: total });
                return Flow::Stop;
            }
            if let Err(e) = writer.write_chunk(chunk) {
                failure = Some(e.into());
                return Flow::Stop;
            }
            transfer.add_downloaded(len);
            if transfer.pace(settings.throttle) == Gate::Cancelled {
                cancelled = true;
                return Flow::Stop;
            }
        }
        Flow::Continue
    });

    if let Some(e) = failure {
        return Err(e);
    }
    if cancelled || transfer.is_cancel_requested() {
        return Ok(Outcome::Cancelled);
    }
    match streamed? {
        StreamEnd::Finished => {}
        StreamEnd::Stopped => return Ok(Outcome::Cancelled),
    }

    let received = writer.written();
    if total > 0 && received != total {
        return Err(TransferError::PartialTransfer {
            expected: total,
            received,
        });
    }
    Ok(Outcome::Completed)
}
