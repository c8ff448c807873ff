//! Response normalization.
//!
//! The two transport kinds report results in different shapes: a streamed
//! response carries an `ok` flag and a one-shot body, a buffered response
//! carries already-parsed data plus the request config it was issued with.
//! `normalize` maps both onto [`NormalizedContext`] so the classifier and
//! observers never care which transport produced a response.

mod headers;
mod url;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use self::headers::{lowercase_headers, parse_header_lines};
pub use self::url::join_url;

/// Which transport family produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Streamed,
    Buffered,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Streamed => write!(f, "streamed"),
            TransportKind::Buffered => write!(f, "buffered"),
        }
    }
}

/// Fetch-style response: status, raw header pairs, `ok` flag and a body that
/// the caller reads once.
#[derive(Debug, Clone)]
pub struct StreamedResponse {
    pub url: String,
    pub method: String,
    pub status: u16,
    /// Headers as received (original case, order preserved).
    pub headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl StreamedResponse {
    pub fn new(
        url: impl Into<String>,
        method: impl Into<String>,
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            status,
            headers,
            body,
        }
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Borrow the body without consuming it.
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Consume the response and take ownership of the body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Request settings a buffered response remembers (base URL + relative path).
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub base_url: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
}

/// Client-style response: headers as a plain mapping, numeric status and
/// data parsed up front.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub data: Value,
    pub config: RequestConfig,
}

/// A transport result, closed over the two supported transport kinds.
#[derive(Debug, Clone)]
pub enum RawResponse {
    Streamed(StreamedResponse),
    Buffered(BufferedResponse),
}

impl RawResponse {
    pub fn kind(&self) -> TransportKind {
        match self {
            RawResponse::Streamed(_) => TransportKind::Streamed,
            RawResponse::Buffered(_) => TransportKind::Buffered,
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            RawResponse::Streamed(r) => r.status,
            RawResponse::Buffered(r) => r.status,
        }
    }

    /// Whether the transport itself considers this a success.
    ///
    /// Streamed responses expose an explicit `ok` flag; buffered transports
    /// reject failing statuses before a response is produced, so any buffered
    /// value that reaches here counts as a success.
    pub fn is_success(&self) -> bool {
        match self {
            RawResponse::Streamed(r) => r.ok(),
            RawResponse::Buffered(_) => true,
        }
    }
}

/// Transport-agnostic view of one response.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedContext {
    pub kind: TransportKind,
    pub url: String,
    pub method: String,
    pub status: u16,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
    /// Parsed JSON body, `Null` when absent or not JSON. Shared, never re-read.
    pub body: Arc<Value>,
    pub is_error: bool,
}

impl NormalizedContext {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Build a [`NormalizedContext`] from a raw transport result.
///
/// The streamed body is parsed from a borrowed slice, so the response stays
/// fully readable for whoever inspects it next.
pub fn normalize(raw: &RawResponse) -> NormalizedContext {
    match raw {
        RawResponse::Streamed(r) => normalize_streamed(r),
        RawResponse::Buffered(r) => normalize_buffered(r),
    }
}

fn normalize_streamed(r: &StreamedResponse) -> NormalizedContext {
    NormalizedContext {
        kind: TransportKind::Streamed,
        url: r.url.clone(),
        method: r.method.clone(),
        status: r.status,
        headers: lowercase_headers(r.headers.iter().map(|(k, v)| (k, v))),
        body: Arc::new(parse_body(r.body_bytes())),
        is_error: !r.ok(),
    }
}

fn normalize_buffered(r: &BufferedResponse) -> NormalizedContext {
    NormalizedContext {
        kind: TransportKind::Buffered,
        url: join_url(r.config.base_url.as_deref(), r.config.url.as_deref()),
        method: r.config.method.clone().unwrap_or_default(),
        status: r.status,
        headers: lowercase_headers(&r.headers),
        body: Arc::new(r.data.clone()),
        is_error: r.status < 200 || r.status >= 400,
    }
}

/// Parse bytes as JSON; empty or invalid input becomes `Null`.
pub(crate) fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn streamed(status: u16, headers: &[(&str, &str)], body: &str) -> StreamedResponse {
        StreamedResponse::new(
            "https://api.example.com/items",
            "GET",
            status,
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body.as_bytes().to_vec(),
        )
    }

    #[test]
    fn streamed_headers_are_lowercased() {
        let r = streamed(429, &[("Retry-After", "5"), ("X-RateLimit-Limit", "3")], "");
        let ctx = normalize(&RawResponse::Streamed(r));
        assert_eq!(ctx.headers.get("retry-after").map(String::as_str), Some("5"));
        assert_eq!(ctx.header("X-RATELIMIT-LIMIT"), Some("3"));
        assert!(ctx.is_error);
        assert_eq!(ctx.kind, TransportKind::Streamed);
    }

    #[test]
    fn streamed_body_survives_normalization() {
        let r = streamed(429, &[], r#"{"retryAfter":1}"#);
        let raw = RawResponse::Streamed(r);
        let first = normalize(&raw);
        let second = normalize(&raw);
        assert_eq!(*first.body, json!({"retryAfter": 1}));
        assert_eq!(first, second);
        let RawResponse::Streamed(r) = raw else {
            panic!("expected streamed");
        };
        assert_eq!(r.into_body(), br#"{"retryAfter":1}"#.to_vec());
    }

    #[test]
    fn unparsable_or_empty_body_is_null() {
        let ctx = normalize(&RawResponse::Streamed(streamed(500, &[], "<html>oops")));
        assert_eq!(*ctx.body, Value::Null);
        let ctx = normalize(&RawResponse::Streamed(streamed(204, &[], "")));
        assert_eq!(*ctx.body, Value::Null);
        assert!(!ctx.is_error);
    }

    #[test]
    fn buffered_joins_url_and_reports_method() {
        let r = BufferedResponse {
            status: 503,
            headers: HashMap::from([("Retry-After".to_string(), "2".to_string())]),
            data: json!({"message": "busy"}),
            config: RequestConfig {
                base_url: Some("https://api.example.com/".into()),
                url: Some("/v1/items".into()),
                method: Some("post".into()),
            },
        };
        let ctx = normalize(&RawResponse::Buffered(r));
        assert_eq!(ctx.url, "https://api.example.com/v1/items");
        assert_eq!(ctx.method, "post");
        assert_eq!(ctx.header("retry-after"), Some("2"));
        assert!(ctx.is_error);
        assert_eq!(ctx.body["message"], "busy");
    }

    #[test]
    fn buffered_3xx_is_not_error() {
        let r = BufferedResponse {
            status: 304,
            headers: HashMap::new(),
            data: Value::Null,
            config: RequestConfig::default(),
        };
        assert!(!normalize(&RawResponse::Buffered(r)).is_error);
    }

    #[test]
    fn raw_response_success_flag() {
        assert!(!RawResponse::Streamed(streamed(429, &[], "")).is_success());
        assert!(RawResponse::Streamed(streamed(200, &[], "")).is_success());
    }
}
