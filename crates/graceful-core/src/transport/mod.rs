//! libcurl-backed transport adapters.
//!
//! Both adapters run the blocking transfer on tokio's blocking pool and hand
//! back an attempt result the retry session understands:
//!
//! - [`send_streamed`] behaves like `fetch`: any HTTP status is returned as a
//!   [`StreamedResponse`] and the session checks its `ok` flag.
//! - [`send_buffered`] behaves like a buffering client: the body is parsed up
//!   front and non-2xx statuses are rejected as [`AttemptError::Response`].

mod client;

pub use client::{perform, CurlRequest};

use crate::normalize::{
    lowercase_headers, parse_body, BufferedResponse, RawResponse, RequestConfig, StreamedResponse,
};
use crate::retry::AttemptError;

/// Send `req` with fetch semantics.
pub async fn send_streamed(req: CurlRequest) -> Result<RawResponse, AttemptError> {
    let resp = perform_blocking(req).await?;
    Ok(RawResponse::Streamed(resp))
}

/// Send `req` with buffered-client semantics.
pub async fn send_buffered(req: CurlRequest) -> Result<RawResponse, AttemptError> {
    let config = RequestConfig {
        base_url: req.base_url.clone(),
        url: Some(req.url.clone()),
        method: Some(req.method.clone()),
    };
    let resp = perform_blocking(req).await?;
    let ok = resp.ok();
    let buffered = RawResponse::Buffered(BufferedResponse {
        status: resp.status,
        headers: lowercase_headers(resp.headers.iter().map(|(k, v)| (k, v))),
        data: parse_body(resp.body_bytes()),
        config,
    });
    if ok {
        Ok(buffered)
    } else {
        Err(AttemptError::Response(buffered))
    }
}

async fn perform_blocking(req: CurlRequest) -> Result<StreamedResponse, AttemptError> {
    tokio::task::spawn_blocking(move || perform(&req))
        .await
        .map_err(AttemptError::transport)?
        .map_err(AttemptError::transport)
}
