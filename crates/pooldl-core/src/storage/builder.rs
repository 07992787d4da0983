//! Creates the temp file (and its directories) for one transfer.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use super::writer::StorageWriter;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

pub struct StorageWriterBuilder {
    file: File,
    temp_path: PathBuf,
}

impl StorageWriterBuilder {
    /// Create `temp_path`, making any missing parent directories. Truncates a
    /// leftover file from an earlier attempt.
    pub fn create(temp_path: &Path) -> io::Result<Self> {
        if let Some(parent) = temp_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        Ok(Self {
            file,
            temp_path: temp_path.to_path_buf(),
        })
    }

    /// Reserve `size` bytes up front. On Unix tries `posix_fallocate` so a full
    /// disk fails here rather than mid-transfer; falls back to `set_len`.
    pub fn preallocate(&mut self, size: u64) -> io::Result<()> {
        #[cfg(unix)]
        {
            let fd = self.file.as_raw_fd();
            let r = unsafe { libc::posix_fallocate(fd, 0, size as libc::off_t) };
            if r == 0 {
                return Ok(());
            }
            tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
        }
        self.file.set_len(size)
    }

    pub fn build(self) -> StorageWriter {
        StorageWriter::new(self.file, self.temp_path)
    }
}
