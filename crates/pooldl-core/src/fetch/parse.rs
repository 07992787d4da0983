//! Response header parsing for the curl fetcher.

/// Status code from a status line such as `HTTP/1.1 206 Partial Content` or `HTTP/2 200`.
pub(crate) fn status_code(line: &str) -> Option<u32> {
    let line = line.trim();
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Content-Length of the final response in `lines`.
///
/// With redirects followed, curl reports the headers of every hop; only the
/// block after the last status line describes the body we will receive.
pub(crate) fn final_content_length(lines: &[String]) -> Option<u64> {
    let start = lines
        .iter()
        .rposition(|l| status_code(l).is_some())
        .map(|i| i + 1)
        .unwrap_or(0);

    lines[start..].iter().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse::<u64>().ok()
        } else {
            None
        }
    })
}

pub(crate) fn is_success(code: u32) -> bool {
    (200..300).contains(&code)
}
