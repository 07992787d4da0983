//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves one static body on every path. HEAD answers with Content-Length;
//! GET answers with the body. One thread per connection, `Connection: close`.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// If false, HEAD returns 405 (servers that block HEAD).
    pub head_allowed: bool,
    /// Status line code for both HEAD and GET. Non-2xx sends a short error page.
    pub status: u16,
    /// Content-Length to announce instead of the real body length.
    pub declared_len: Option<u64>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            status: 200,
            declared_len: None,
        }
    }
}

pub struct TestServer {
    base: String,
    gets: Arc<AtomicUsize>,
}

impl TestServer {
    /// URL for `path` on this server, e.g. `url("files/a.bin")`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    /// Number of GET requests served so far.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

/// Start a server in a background thread serving `body`. It runs until the
/// process exits.
pub fn start(body: Vec<u8>) -> TestServer {
    start_with_options(body, ServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: ServerOptions) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let gets = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&gets);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let counter = Arc::clone(&counter);
            thread::spawn(move || handle(stream, &body, opts, &counter));
        }
    });
    TestServer {
        base: format!("http://127.0.0.1:{}/", port),
        gets,
    }
}

/// A local URL with nothing listening behind it.
pub fn unreachable_url() -> String {
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    format!("http://127.0.0.1:{}/missing.bin", port)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

fn handle(mut stream: TcpStream, body: &[u8], opts: ServerOptions, gets: &AtomicUsize) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(30)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let method = std::str::from_utf8(&buf[..n])
        .ok()
        .and_then(|r| r.split_whitespace().next())
        .unwrap_or("")
        .to_string();

    let is_head = method.eq_ignore_ascii_case("HEAD");
    if is_head && !opts.head_allowed {
        let _ = stream.write_all(
            b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        return;
    }
    if !is_head && !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(
            b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        return;
    }
    if !is_head {
        gets.fetch_add(1, Ordering::SeqCst);
    }

    let payload: &[u8] = if (200..300).contains(&opts.status) {
        body
    } else {
        b"error page"
    };
    let length = opts.declared_len.unwrap_or(payload.len() as u64);
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        opts.status,
        reason(opts.status),
        length
    );
    if stream.write_all(head.as_bytes()).is_err() || is_head {
        return;
    }
    for piece in payload.chunks(16 * 1024) {
        if stream.write_all(piece).is_err() {
            return;
        }
    }
    let _ = stream.flush();
}
