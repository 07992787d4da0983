//! Destination sink and file lifecycle.
//!
//! Bytes go to `<destination>.part` (preallocated when the size is known, via
//! fallocate on Linux when available) and are renamed to the final name only
//! once the transfer completed. Cancelled or failed transfers discard the temp file.

mod builder;
mod writer;

pub use builder::StorageWriterBuilder;
pub use writer::StorageWriter;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Temporary file suffix used before the final rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `a.png` → `a.png.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Delete the temp file left for `final_path`, if there is one.
pub fn remove_temp(final_path: &Path) {
    let temp = temp_path(final_path);
    match fs::remove_file(&temp) {
        Ok(()) => tracing::debug!(path = %temp.display(), "removed temp file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %temp.display(), "could not remove temp file: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_temp_deletes_leftover_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("left.bin");
        let tp = temp_path(&final_path);
        fs::write(&tp, b"partial").unwrap();
        remove_temp(&final_path);
        assert!(!tp.exists());
        remove_temp(&final_path);
    }

    #[test]
    fn temp_path_appends_part() {
        let p = temp_path(Path::new("20240101_120000_1_image.png"));
        assert_eq!(p.to_string_lossy(), "20240101_120000_1_image.png.part");
        let p2 = temp_path(Path::new("/tmp/downloads/archive.zip"));
        assert_eq!(p2.to_string_lossy(), "/tmp/downloads/archive.zip.part");
    }

    #[test]
    fn write_then_finalize_renames() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("nested").join("out.bin");
        let tp = temp_path(&final_path);

        let mut builder = StorageWriterBuilder::create(&tp).unwrap();
        builder.preallocate(10).unwrap();
        let mut writer = builder.build();
        writer.write_chunk(b"hello").unwrap();
        writer.write_chunk(b"world").unwrap();
        assert_eq!(writer.written(), 10);
        writer.finalize(&final_path).unwrap();

        assert!(!tp.exists());
        assert_eq!(std::fs::read(&final_path).unwrap(), b"helloworld");
    }

    #[test]
    fn discard_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let tp = dir.path().join("gone.bin.part");
        let mut writer = StorageWriterBuilder::create(&tp).unwrap().build();
        writer.write_chunk(b"partial").unwrap();
        assert!(tp.exists());
        writer.discard();
        assert!(!tp.exists());
    }

    #[test]
    fn create_truncates_stale_temp() {
        let dir = tempfile::tempdir().unwrap();
        let tp = dir.path().join("stale.part");
        std::fs::write(&tp, b"old contents that are long").unwrap();
        let mut writer = StorageWriterBuilder::create(&tp).unwrap().build();
        writer.write_chunk(b"new").unwrap();
        let final_path = dir.path().join("stale");
        writer.finalize(&final_path).unwrap();
        assert_eq!(std::fs::read(&final_path).unwrap(), b"new");
    }
}
