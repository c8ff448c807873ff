//! Retry and backoff engine.
//!
//! This module classifies failed responses for rate-limit signals, resolves
//! how long to back off, and drives an async operation through repeated
//! attempts while reporting each transition to an observer.

mod classify;
mod error;
mod event;
mod policy;
mod run;

pub use classify::{classify, classify_at, RateLimitInfo, RateLimitSignal, ResetAt};
pub use error::{AttemptError, AttemptTimedOut, BoxError, FailedResponse, RequestError};
pub use event::{Failure, LifecycleEvent, NoopObserver, Observer, Phase};
pub use policy::{
    is_throttle_status, BackoffPolicy, ExponentialBackoff, RetryDecision, RetryOptions,
    RetryRule, DEFAULT_BACKOFF_CEILING, DEFAULT_BASE_DELAY, THROTTLE_STATUSES,
};
pub use run::{run_with_retry, RetrySession};
