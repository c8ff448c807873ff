//! Attempt and request error types.

use std::error::Error as StdError;
use std::fmt;

use super::classify::RateLimitInfo;
use crate::normalize::{NormalizedContext, RawResponse};

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Why a single attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    /// No response to inspect (connect, DNS, timeout, ...). Never retried.
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),
    /// The transport rejected with a response we can classify.
    #[error("HTTP {}", .0.status())]
    Response(RawResponse),
}

impl AttemptError {
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        AttemptError::Transport(err.into())
    }

    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            AttemptError::Transport(_) => None,
            AttemptError::Response(r) => Some(r),
        }
    }
}

/// An attempt did not finish within the configured attempt timeout.
#[derive(Debug, thiserror::Error)]
#[error("attempt timed out after {0:?}")]
pub struct AttemptTimedOut(pub std::time::Duration);

/// A failed response together with what was learned from it.
#[derive(Debug, Clone)]
pub struct FailedResponse {
    pub response: RawResponse,
    pub context: NormalizedContext,
    pub rate_limit: Option<RateLimitInfo>,
}

impl fmt::Display for FailedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = if self.context.method.is_empty() {
            "request"
        } else {
            self.context.method.as_str()
        };
        write!(f, "{} {} returned HTTP {}", method, self.context.url, self.context.status)?;
        if let Some(info) = &self.rate_limit {
            write!(f, " (rate limited, retry after {}s)", info.retry_after.as_secs())?;
        }
        Ok(())
    }
}

/// Terminal outcome of a retry session that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),
    /// Response inspected, no retry signal found.
    #[error("{0}")]
    NotRetryable(Box<FailedResponse>),
    /// Retry-eligible, but retries are disabled.
    #[error("{0}")]
    RateLimited(Box<FailedResponse>),
    /// Retry limit reached, or the backoff policy said stop.
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        last: Box<FailedResponse>,
    },
    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl RequestError {
    fn failed(&self) -> Option<&FailedResponse> {
        match self {
            RequestError::NotRetryable(f) | RequestError::RateLimited(f) => Some(f),
            RequestError::Exhausted { last, .. } => Some(last),
            RequestError::Transport(_) | RequestError::Cancelled { .. } => None,
        }
    }

    /// Rate-limit metadata of the last failure, when one was computed.
    pub fn rate_limit_info(&self) -> Option<&RateLimitInfo> {
        self.failed().and_then(|f| f.rate_limit.as_ref())
    }

    /// The last failed response, if any was received.
    pub fn response(&self) -> Option<&RawResponse> {
        self.failed().map(|f| &f.response)
    }

    pub fn context(&self) -> Option<&NormalizedContext> {
        self.failed().map(|f| &f.context)
    }

    pub fn status(&self) -> Option<u16> {
        self.failed().map(|f| f.context.status)
    }
}
