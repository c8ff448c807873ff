//! Minimal HTTP/1.1 server that rate-limits the first N requests.
//!
//! Throttled requests get 429 with a wait hint in the body or in headers;
//! later requests get 200 with a small JSON body. `GET /missing` is always
//! 404 without any hint.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Where throttled responses carry their hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    /// `{"retryAfter": secs, "retryLimit": limit, ...}` JSON body.
    Body,
    /// `Retry-After` / `X-RateLimit-*` headers, empty body.
    Headers,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitOptions {
    /// How many requests are throttled before the server starts answering 200.
    pub throttle: usize,
    pub hint: Hint,
    pub retry_after_secs: u64,
    /// Retry limit advertised; `None` omits it.
    pub retry_limit: Option<u32>,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            throttle: 1,
            hint: Hint::Body,
            retry_after_secs: 1,
            retry_limit: Some(3),
        }
    }
}

pub struct RateLimitServer {
    /// e.g. "http://127.0.0.1:12345"
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl RateLimitServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Starts a server in a background thread. It runs until the process exits.
pub fn start(opts: RateLimitOptions) -> RateLimitServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let counter = Arc::clone(&counter);
            thread::spawn(move || handle(stream, &counter, opts));
        }
    });
    RateLimitServer {
        base_url: format!("http://127.0.0.1:{}", port),
        hits,
    }
}

fn handle(mut stream: std::net::TcpStream, hits: &AtomicUsize, opts: RateLimitOptions) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    let seen = hits.fetch_add(1, Ordering::SeqCst);
    let (status, headers, body) = if path == "/missing" {
        ("404 Not Found", String::new(), r#"{"message":"not found"}"#.to_string())
    } else if seen < opts.throttle {
        throttled(&opts)
    } else {
        (
            "200 OK",
            String::new(),
            format!(r#"{{"message":"ok","path":"{}"}}"#, path),
        )
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n{}",
        status,
        body.len(),
        headers,
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

fn throttled(opts: &RateLimitOptions) -> (&'static str, String, String) {
    match opts.hint {
        Hint::Body => {
            let mut body = serde_json::json!({
                "message": "Too many requests",
                "retryAfter": opts.retry_after_secs,
                "rateLimitRemaining": 20,
                "rateLimitReset": 50,
            });
            if let Some(limit) = opts.retry_limit {
                body["retryLimit"] = limit.into();
            }
            ("429 Too Many Requests", String::new(), body.to_string())
        }
        Hint::Headers => {
            let mut headers = format!("Retry-After: {}\r\n", opts.retry_after_secs);
            if let Some(limit) = opts.retry_limit {
                headers.push_str(&format!("X-RateLimit-Limit: {}\r\n", limit));
            }
            headers.push_str("X-RateLimit-Remaining: 0\r\n");
            ("429 Too Many Requests", headers, String::new())
        }
    }
}
