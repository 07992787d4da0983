//! `pooldl get` – download URLs through the pool with interactive control.

use anyhow::{bail, Context, Result};
use pooldl_core::config::EngineConfig;
use pooldl_core::{DownloadManager, ProgressEvent, TransferId, TransferSnapshot, TransferStatus};
use std::collections::HashMap;
use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;

/// Progress lines for transfers of unknown size are printed this often.
const UNKNOWN_SIZE_PRINT_STEP: u64 = 256 * 1024;

/// A line typed on stdin while transfers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    TogglePause(TransferId),
    Cancel(TransferId),
    Status,
    Quit,
}

pub(crate) fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or_else(|| "empty command".to_string())?;
    let id = |arg: Option<&str>| -> Result<TransferId, String> {
        let raw = arg.ok_or_else(|| format!("'{}' needs a transfer id", verb))?;
        raw.parse()
            .map_err(|_| format!("'{}' is not a transfer id", raw))
    };
    let cmd = match verb {
        "p" | "pause" => Command::TogglePause(id(words.next())?),
        "c" | "cancel" => Command::Cancel(id(words.next())?),
        "s" | "status" => Command::Status,
        "q" | "quit" => Command::Quit,
        other => return Err(format!("unknown command '{}' (p <id>, c <id>, s, q)", other)),
    };
    if words.next().is_some() {
        return Err("too many arguments".to_string());
    }
    Ok(cmd)
}

pub(crate) fn format_line(snap: &TransferSnapshot) -> String {
    let name = snap
        .destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| snap.source.clone());
    let paused = if snap.pause_requested && !snap.is_terminal() && snap.status != TransferStatus::Paused {
        " (pausing)"
    } else {
        ""
    };
    if snap.total_bytes > 0 {
        format!(
            "[{}] {:>3}% {}/{} {}{}  {}",
            snap.id,
            snap.percent(),
            snap.downloaded_bytes,
            snap.total_bytes,
            snap.status,
            paused,
            name
        )
    } else {
        format!(
            "[{}]    - {} {}{}  {}",
            snap.id, snap.downloaded_bytes, snap.status, paused, name
        )
    }
}

/// Prints a line when a transfer changes status or makes visible progress.
#[derive(Default)]
struct ProgressPrinter {
    last: HashMap<TransferId, (String, u64)>,
}

impl ProgressPrinter {
    /// Returns true when a line was printed.
    fn observe(&mut self, snap: &TransferSnapshot) -> bool {
        let status = snap.status.name().to_string();
        let mark = if snap.total_bytes > 0 {
            u64::from(snap.percent())
        } else {
            snap.downloaded_bytes / UNKNOWN_SIZE_PRINT_STEP
        };
        let changed = match self.last.get(&snap.id) {
            Some((s, m)) => *s != status || *m != mark,
            None => true,
        };
        if changed {
            println!("{}", format_line(snap));
            self.last.insert(snap.id, (status, mark));
        }
        changed
    }
}

/// Forward lines from `reader` on a plain thread. The thread is detached so a
/// blocked read never holds up process exit; it stops once the receiver is
/// gone or the reader hits end of input.
fn spawn_line_reader<R>(reader: R) -> Result<mpsc::UnboundedReceiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name("pooldl-stdin".into())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("stdin closed: {}", e);
                        break;
                    }
                }
            }
        })
        .context("cannot spawn stdin reader")?;
    Ok(rx)
}

fn print_status(manager: &DownloadManager) {
    for snap in manager.list() {
        println!("{}", format_line(&snap));
    }
}

fn cancel_all(manager: &DownloadManager) {
    manager.close();
    for snap in manager.list() {
        if !snap.is_terminal() {
            let _ = manager.cancel(snap.id);
        }
    }
}

/// Returns true when the user asked to quit.
fn dispatch(manager: &DownloadManager, line: &str) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    let result = match parse_command(line) {
        Ok(Command::TogglePause(id)) => manager.toggle_pause(id).map(|paused| {
            println!("[{}] {}", id, if paused { "pause requested" } else { "resumed" });
        }),
        Ok(Command::Cancel(id)) => manager.cancel(id),
        Ok(Command::Status) => {
            print_status(manager);
            Ok(())
        }
        Ok(Command::Quit) => return true,
        Err(msg) => {
            eprintln!("{}", msg);
            Ok(())
        }
    };
    if let Err(e) = result {
        eprintln!("{}", e);
    }
    false
}

pub async fn run_get(cfg: EngineConfig, urls: &[String]) -> Result<()> {
    let manager = Arc::new(DownloadManager::new(cfg).context("cannot start download manager")?);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
    manager.subscribe(Arc::new(tx));

    let mut accepted = 0usize;
    for url in urls {
        match manager.submit(url) {
            Ok(id) => {
                accepted += 1;
                println!("[{}] queued {}", id, url);
            }
            Err(e) => eprintln!("skipping: {}", e),
        }
    }
    if accepted == 0 {
        bail!("no valid URLs to download");
    }

    let mut finished = {
        let m = Arc::clone(&manager);
        tokio::task::spawn_blocking(move || m.wait_all())
    };
    let mut lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()))?;
    let mut stdin_open = true;
    let mut printer = ProgressPrinter::default();

    let results = loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                printer.observe(&event.snapshot);
            }
            line = lines.recv(), if stdin_open => match line {
                Some(line) => {
                    if dispatch(&manager, &line) {
                        println!("cancelling all transfers");
                        cancel_all(&manager);
                    }
                }
                None => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("interrupted, cancelling all transfers");
                cancel_all(&manager);
            }
            done = &mut finished => break done.context("wait task failed")?,
        }
    };
    while let Ok(event) = rx.try_recv() {
        printer.observe(&event.snapshot);
    }
    // The final notification can still be in flight when `wait_all` returns.
    for snap in &results {
        printer.observe(snap);
    }

    let failed = results
        .iter()
        .filter(|s| matches!(s.status, TransferStatus::Error(_)))
        .count();
    let completed = results
        .iter()
        .filter(|s| s.status == TransferStatus::Completed)
        .count();
    println!(
        "{} completed, {} failed, {} cancelled",
        completed,
        failed,
        results.len() - completed - failed
    );

    if let Ok(manager) = Arc::try_unwrap(manager) {
        manager.shutdown();
    }
    if failed > 0 {
        bail!("{} transfer(s) failed", failed);
    }
    Ok(())
}
