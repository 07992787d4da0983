//! Sequential writer for a transfer's temp file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Owned by one worker; bytes are appended in arrival order.
pub struct StorageWriter {
    out: BufWriter<File>,
    temp_path: PathBuf,
    written: u64,
}

impl StorageWriter {
    pub(crate) fn new(file: File, temp_path: PathBuf) -> Self {
        Self {
            out: BufWriter::new(file),
            temp_path,
            written: 0,
        }
    }

    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.out.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Flush, fsync, trim any preallocated tail, and rename to `final_path`.
    /// On failure the temp file is removed.
    pub fn finalize(self, final_path: &Path) -> io::Result<()> {
        let temp_path = self.temp_path.clone();
        let result = self.close().and_then(|()| fs::rename(&temp_path, final_path));
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    fn close(self) -> io::Result<()> {
        let written = self.written;
        let file = self.out.into_inner().map_err(|e| e.into_error())?;
        file.set_len(written)?;
        file.sync_all()
    }

    /// Drop the partial file.
    pub fn discard(self) {
        let temp_path = self.temp_path.clone();
        drop(self.out);
        match fs::remove_file(&temp_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %temp_path.display(), "could not remove temp file: {}", e),
        }
    }
}
