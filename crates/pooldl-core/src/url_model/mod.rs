//! Locator validation and destination naming.
//!
//! A submitted locator must be an absolute `http`/`https` URL with a host.
//! Its output file is `<output_dir>/<YYYYMMDD_HHMMSS>_<id>_<name>`, where
//! `name` comes from the last URL path segment, sanitized for Linux.

mod locator;
mod naming;

pub use locator::parse_source;
pub use naming::{destination_file_name, filename_from_url, sanitize_filename};

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use url::Url;

use crate::transfer::TransferId;

/// Full destination path for a transfer submitted at `submitted_at`.
pub fn destination_path(
    output_dir: &Path,
    source: &Url,
    id: TransferId,
    submitted_at: DateTime<Local>,
) -> PathBuf {
    output_dir.join(destination_file_name(source, id, submitted_at))
}
