//! Output file naming.

use chrono::{DateTime, Local};
use url::Url;

use crate::transfer::TransferId;

/// Used when the URL path yields nothing usable.
const DEFAULT_FILENAME: &str = "download.bin";

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

/// Last non-empty path segment, percent-decoded. `None` for root paths.
pub fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = percent_decode(segment);
    if decoded == "." || decoded == ".." {
        return None;
    }
    Some(decoded)
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Make `name` safe as a single Linux path component: separators, NUL,
/// control characters and whitespace become `_` (runs collapsed), leading and
/// trailing dots/underscores are trimmed, length capped at NAME_MAX bytes.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let unsafe_char = matches!(c, '/' | '\\' | '\0') || c.is_control() || c.is_whitespace();
        if unsafe_char {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

/// `<YYYYMMDD_HHMMSS>_<id>_<name>`; the id keeps same-second submissions of
/// one URL from colliding.
pub fn destination_file_name(source: &Url, id: TransferId, submitted_at: DateTime<Local>) -> String {
    let name = filename_from_url(source)
        .map(|n| sanitize_filename(&n))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
    let full = format!("{}_{}_{}", submitted_at.format("%Y%m%d_%H%M%S"), id, name);
    let mut end = full.len().min(NAME_MAX);
    while !full.is_char_boundary(end) {
        end -= 1;
    }
    full[..end].to_string()
}
