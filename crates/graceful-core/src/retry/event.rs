//! Lifecycle notifications delivered to a session's observer.

use std::error::Error as StdError;
use std::fmt;

use super::classify::RateLimitInfo;
use crate::normalize::{NormalizedContext, RawResponse};

/// What a [`LifecycleEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// First attempt of a session is about to run.
    Loading,
    Succeeded,
    /// An attempt failed; no rate-limit metadata attached.
    Failed,
    /// Rate limited and retries are disabled.
    RateLimited,
    /// A backoff wait elapsed; the next attempt is starting.
    Retrying,
}

/// Borrowed view of why an attempt failed.
#[derive(Debug, Clone, Copy)]
pub enum Failure<'a> {
    Transport(&'a (dyn StdError + Send + Sync + 'static)),
    Response(&'a RawResponse),
}

impl Failure<'_> {
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            Failure::Transport(_) => None,
            Failure::Response(r) => Some(r),
        }
    }
}

impl fmt::Display for Failure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Transport(e) => write!(f, "transport failure: {}", e),
            Failure::Response(r) => write!(f, "HTTP {}", r.status()),
        }
    }
}

/// One phase transition of a retry session.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleEvent<'a> {
    pub error: Option<Failure<'a>>,
    pub response: Option<&'a RawResponse>,
    pub is_retry: bool,
    pub is_loading: bool,
    /// 0-based index of the attempt the event belongs to.
    pub attempt: u32,
    pub rate_limit: Option<&'a RateLimitInfo>,
    /// Normalized snapshot of the failed response, shared with the classifier.
    pub context: Option<&'a NormalizedContext>,
    phase: Phase,
}

impl<'a> LifecycleEvent<'a> {
    pub(crate) fn loading() -> Self {
        Self {
            error: None,
            response: None,
            is_retry: false,
            is_loading: true,
            attempt: 0,
            rate_limit: None,
            context: None,
            phase: Phase::Loading,
        }
    }

    pub(crate) fn succeeded(response: &'a RawResponse, attempt: u32) -> Self {
        Self {
            error: None,
            response: Some(response),
            is_retry: attempt > 0,
            is_loading: false,
            attempt,
            rate_limit: None,
            context: None,
            phase: Phase::Succeeded,
        }
    }

    pub(crate) fn failed(
        error: Failure<'a>,
        context: Option<&'a NormalizedContext>,
        attempt: u32,
    ) -> Self {
        Self {
            error: Some(error),
            response: None,
            is_retry: attempt > 0,
            is_loading: false,
            attempt,
            rate_limit: None,
            context,
            phase: Phase::Failed,
        }
    }

    /// Rate limited with retries disabled.
    pub(crate) fn rate_limited(mut self, info: &'a RateLimitInfo) -> Self {
        self.rate_limit = Some(info);
        self.phase = Phase::RateLimited;
        self
    }

    /// The wait described by `info` elapsed; the next attempt is starting.
    pub(crate) fn retrying(mut self, info: &'a RateLimitInfo) -> Self {
        self.rate_limit = Some(info);
        self.is_retry = true;
        self.phase = Phase::Retrying;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// Receives lifecycle events. Calls are synchronous and must not block.
pub trait Observer {
    fn on_event(&self, event: &LifecycleEvent<'_>);
}

impl<F> Observer for F
where
    F: Fn(&LifecycleEvent<'_>),
{
    fn on_event(&self, event: &LifecycleEvent<'_>) {
        self(event)
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_event(&self, _event: &LifecycleEvent<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::StreamedResponse;
    use crate::retry::classify::classify;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn constructors_set_flags_and_phase() {
        assert_eq!(LifecycleEvent::loading().phase(), Phase::Loading);
        assert!(LifecycleEvent::loading().is_loading);

        let resp = RawResponse::Streamed(StreamedResponse::new("u", "GET", 200, vec![], vec![]));
        let ok = LifecycleEvent::succeeded(&resp, 2);
        assert_eq!(ok.phase(), Phase::Succeeded);
        assert!(ok.is_retry);
        assert!(!ok.is_loading);

        let signal = classify(&json!({"retryAfter": 2}), &HashMap::new());
        let info = RateLimitInfo::new(&signal, Duration::from_secs(2), 0);
        let failed = LifecycleEvent::failed(Failure::Response(&resp), None, 0);
        assert_eq!(failed.phase(), Phase::Failed);
        assert!(!failed.is_retry);
        assert_eq!(failed.error.map(|e| e.to_string()).as_deref(), Some("HTTP 200"));
        assert_eq!(failed.rate_limited(&info).phase(), Phase::RateLimited);
        let retry = failed.retrying(&info);
        assert_eq!(retry.phase(), Phase::Retrying);
        assert!(retry.is_retry);
    }

    #[test]
    fn closures_are_observers() {
        let seen = RefCell::new(Vec::new());
        let observer = |e: &LifecycleEvent<'_>| seen.borrow_mut().push(e.phase());
        observer.on_event(&LifecycleEvent::loading());
        NoopObserver.on_event(&LifecycleEvent::loading());
        assert_eq!(*seen.borrow(), vec![Phase::Loading]);
    }
}
