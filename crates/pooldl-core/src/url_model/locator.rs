//! Submission-time validation of a source locator.

use url::Url;

use crate::error::EngineError;

/// Parse and validate a locator. Surrounding whitespace is ignored.
pub fn parse_source(raw: &str) -> Result<Url, EngineError> {
    let invalid = |reason: String| EngineError::InvalidSource {
        locator: raw.to_string(),
        reason,
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("URL is empty".into()));
    }
    let url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("URL has no host".into()));
    }
    Ok(url)
}
