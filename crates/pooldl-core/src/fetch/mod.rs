//! Source fetching.
//!
//! The worker only depends on the `Fetcher` trait: a size negotiation step and
//! a body stream delivered through a callback that can stop the transfer.
//! `CurlFetcher` is the HTTP(S) implementation backed by libcurl.

mod http;
mod parse;

pub use http::CurlFetcher;

use url::Url;

use crate::error::TransferError;

/// Outcome of size negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Negotiated {
    /// Declared body length, if the source announced one.
    pub content_length: Option<u64>,
}

/// Returned by the body callback after each delivered buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// How a stream ended when no error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The source reached end of body.
    Finished,
    /// The callback returned `Flow::Stop` or `interrupted` turned true.
    Stopped,
}

/// A source of bytes for one locator.
///
/// `interrupted` is polled by implementations that can abort a blocked read
/// (e.g. while waiting on a stalled connection); it lets cancellation reach
/// the transfer between callback invocations.
pub trait Fetcher: Send + Sync {
    /// Open the source and learn its total size. Failure here means the
    /// source is unreachable or refused the request.
    fn negotiate(
        &self,
        url: &Url,
        interrupted: &dyn Fn() -> bool,
    ) -> Result<Negotiated, TransferError>;

    /// Stream the body, calling `on_data` for each received buffer in order.
    fn stream(
        &self,
        url: &Url,
        interrupted: &dyn Fn() -> bool,
        on_data: &mut dyn FnMut(&[u8]) -> Flow,
    ) -> Result<StreamEnd, TransferError>;
}
