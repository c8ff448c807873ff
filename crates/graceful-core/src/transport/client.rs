use std::str;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::normalize::{join_url, parse_header_lines, StreamedResponse};

/// One HTTP request as handed to libcurl.
#[derive(Debug, Clone)]
pub struct CurlRequest {
    /// Absolute URL, or a path resolved against `base_url`.
    pub url: String,
    pub base_url: Option<String>,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl CurlRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        let http = HttpConfig::default();
        Self {
            url: url.into(),
            base_url: None,
            method: method.into().to_ascii_uppercase(),
            headers: Vec::new(),
            body: None,
            connect_timeout: Duration::from_secs(http.connect_timeout_secs),
            timeout: Duration::from_secs(http.timeout_secs),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeouts(mut self, http: &HttpConfig) -> Self {
        self.connect_timeout = Duration::from_secs(http.connect_timeout_secs);
        self.timeout = Duration::from_secs(http.timeout_secs);
        self
    }

    /// `url` joined onto `base_url`.
    pub fn full_url(&self) -> String {
        join_url(self.base_url.as_deref(), Some(&self.url))
    }
}

/// Performs `req` and returns whatever the server answered, any status.
///
/// Follows redirects; the response carries the effective URL.
/// Runs in the current thread; call from `spawn_blocking` if used from async code.
pub fn perform(req: &CurlRequest) -> Result<StreamedResponse, curl::Error> {
    let url = req.full_url();
    let mut header_lines: Vec<String> = Vec::new();
    let mut body: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(&url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(req.connect_timeout)?;
    easy.timeout(req.timeout)?;

    match (req.method.as_str(), &req.body) {
        ("GET", None) => easy.get(true)?,
        ("HEAD", None) => easy.nobody(true)?,
        (method, Some(data)) => {
            easy.post_fields_copy(data)?;
            if method != "POST" {
                easy.custom_request(method)?;
            }
        }
        (method, None) => easy.custom_request(method)?,
    }

    // Build curl list for request headers ("Name: value").
    if !req.headers.is_empty() {
        let mut list = curl::easy::List::new();
        for (k, v) in &req.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                header_lines.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()?;
    let effective_url = easy
        .effective_url()?
        .map(str::to_string)
        .unwrap_or(url);
    tracing::debug!(
        method = %req.method,
        url = %effective_url,
        status,
        bytes = body.len(),
        "curl transfer finished"
    );

    Ok(StreamedResponse::new(
        effective_url,
        req.method.clone(),
        u16::try_from(status).unwrap_or(0),
        parse_header_lines(&header_lines),
        body,
    ))
}
