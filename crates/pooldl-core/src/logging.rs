//! Logging init: append to a file under the XDG state dir, or fall back to stderr.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,pooldl_core=debug,pooldl=debug";

/// Writer handed out per event. Falls back to stderr if the log file handle cannot be cloned.
enum EventWriter {
    File(fs::File),
    Stderr,
}

impl io::Write for EventWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            EventWriter::File(f) => f.write(buf),
            EventWriter::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            EventWriter::File(f) => f.flush(),
            EventWriter::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct LogFile(fs::File);

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = EventWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(EventWriter::File)
            .unwrap_or(EventWriter::Stderr)
    }
}

/// `RUST_LOG` wins; otherwise `verbose` raises everything to debug.
fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(DEFAULT_DIRECTIVES)
        }
    })
}

/// `~/.local/state/pooldl/pooldl.log`
pub fn default_log_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pooldl")?;
    Ok(xdg_dirs.get_state_home().join("pooldl.log"))
}

/// Initialize structured logging appending to `path`. Returns Err if the file
/// cannot be opened so the caller can use `init_logging_stderr` instead.
pub fn init_logging_at(path: &Path, verbose: bool) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create log dir {}", dir.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(BoxMakeWriter::new(LogFile(file)))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("logging already initialized: {}", e))?;

    tracing::info!(path = %path.display(), "pooldl logging initialized");
    Ok(())
}

/// Initialize logging to the default XDG state file.
pub fn init_logging(verbose: bool) -> Result<PathBuf> {
    let path = default_log_path()?;
    init_logging_at(&path, verbose)?;
    Ok(path)
}

/// Initialize logging to stderr only. Use when `init_logging` fails so the CLI still runs.
pub fn init_logging_stderr(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}
