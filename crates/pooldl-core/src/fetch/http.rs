//! HTTP(S) fetcher on libcurl: HEAD request for the size, streaming GET for the body.

use std::cell::Cell;
use std::str;
use std::time::Duration;

use url::Url;

use super::parse;
use super::{Fetcher, Flow, Negotiated, StreamEnd};
use crate::config::EngineConfig;
use crate::error::TransferError;

/// HEAD answers that mean "no HEAD here", not "no resource here".
const HEAD_UNSUPPORTED: [u32; 2] = [405, 501];

/// libcurl-backed `Fetcher`. Cheap to share; each call builds its own handle.
#[derive(Debug, Clone)]
pub struct CurlFetcher {
    connect_timeout: Duration,
    user_agent: String,
    buffer_size: usize,
}

impl CurlFetcher {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            user_agent: config.user_agent.clone(),
            buffer_size: config.chunk_size,
        }
    }

    fn handle(&self, url: &Url) -> Result<curl::easy::Easy, curl::Error> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url.as_str())?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.useragent(&self.user_agent)?;
        // No low-speed or total timeout: a paused transfer parks inside the
        // write callback and would otherwise be killed for "stalling".
        easy.progress(true)?;
        Ok(easy)
    }
}

impl Fetcher for CurlFetcher {
    fn negotiate(
        &self,
        url: &Url,
        interrupted: &dyn Fn() -> bool,
    ) -> Result<Negotiated, TransferError> {
        let mut headers: Vec<String> = Vec::new();
        let neg = |e: curl::Error| TransferError::Negotiation(e.to_string());

        let mut easy = self.handle(url).map_err(neg)?;
        easy.nobody(true).map_err(neg)?;
        {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(s) = str::from_utf8(data) {
                        headers.push(s.trim_end().to_string());
                    }
                    true
                })
                .map_err(neg)?;
            transfer
                .progress_function(|_, _, _, _| !interrupted())
                .map_err(neg)?;
            transfer.perform().map_err(neg)?;
        }

        let code = easy.response_code().map_err(neg)?;
        if parse::is_success(code) {
            let content_length = parse::final_content_length(&headers);
            tracing::debug!(url = %url, ?content_length, "size negotiated");
            return Ok(Negotiated { content_length });
        }
        if HEAD_UNSUPPORTED.contains(&code) {
            tracing::debug!(url = %url, code, "HEAD not supported, size unknown");
            return Ok(Negotiated::default());
        }
        Err(TransferError::Negotiation(format!(
            "HEAD {} returned HTTP {}",
            url, code
        )))
    }

    fn stream(
        &self,
        url: &Url,
        interrupted: &dyn Fn() -> bool,
        on_data: &mut dyn FnMut(&[u8]) -> Flow,
    ) -> Result<StreamEnd, TransferError> {
        let status = Cell::new(0u32);
        let rejected: Cell<Option<u32>> = Cell::new(None);
        let stopped = Cell::new(false);

        let mut easy = self.handle(url)?;
        easy.buffer_size(self.buffer_size.max(1024))?;

        let perform_result = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Some(code) = str::from_utf8(data).ok().and_then(parse::status_code) {
                    status.set(code);
                }
                true
            })?;
            transfer.write_function(|data| {
                let code = status.get();
                if !parse::is_success(code) {
                    // Error page body: refuse it instead of writing it to disk.
                    rejected.set(Some(code));
                    return Ok(0);
                }
                match on_data(data) {
                    Flow::Continue => Ok(data.len()),
                    Flow::Stop => {
                        stopped.set(true);
                        Ok(0)
                    }
                }
            })?;
            transfer.progress_function(|_, _, _, _| !interrupted())?;
            transfer.perform()
        };

        if let Err(e) = perform_result {
            if stopped.get() || (e.is_aborted_by_callback() && interrupted()) {
                return Ok(StreamEnd::Stopped);
            }
            if let Some(code) = rejected.get() {
                return Err(TransferError::Http(code));
            }
            return Err(TransferError::from(e));
        }

        let code = easy.response_code()?;
        if !parse::is_success(code) {
            return Err(TransferError::Http(code));
        }
        Ok(StreamEnd::Finished)
    }
}
