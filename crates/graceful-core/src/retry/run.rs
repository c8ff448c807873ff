//! Retry loop: run an async operation until success or the policy says stop.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::classify::{classify, RateLimitInfo};
use super::error::{AttemptError, AttemptTimedOut, FailedResponse, RequestError};
use super::event::{Failure, LifecycleEvent, NoopObserver, Observer};
use super::policy::{RetryDecision, RetryOptions};
use crate::normalize::{normalize, RawResponse};

/// State of one logical call across all of its attempts.
///
/// Created per call and consumed by [`RetrySession::run`]; nothing in it is
/// shared with other calls.
pub struct RetrySession<'a, O: Observer + ?Sized = NoopObserver> {
    options: &'a RetryOptions,
    observer: &'a O,
    cancel: Option<CancellationToken>,
}

impl<'a> RetrySession<'a, NoopObserver> {
    pub fn new(options: &'a RetryOptions) -> Self {
        Self {
            options,
            observer: &NoopObserver,
            cancel: None,
        }
    }
}

impl<'a, O: Observer + ?Sized> RetrySession<'a, O> {
    pub fn with_observer<P: Observer + ?Sized>(self, observer: &'a P) -> RetrySession<'a, P> {
        RetrySession {
            options: self.options,
            observer,
            cancel: self.cancel,
        }
    }

    /// Stop before the next attempt, or mid-wait, once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }

    /// Drive `operation` to a terminal outcome.
    ///
    /// A streamed response whose `ok` flag is false counts as a failure, the
    /// same as a rejected attempt carrying a response.
    pub async fn run<F, Fut>(self, mut operation: F) -> Result<RawResponse, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RawResponse, AttemptError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if self.is_cancelled() {
                tracing::debug!(attempt, "retry session cancelled before attempt");
                return Err(RequestError::Cancelled { attempts: attempt });
            }
            if attempt == 0 {
                self.observer.on_event(&LifecycleEvent::loading());
            }

            tracing::debug!(attempt, "starting attempt");
            let response = match self.invoke(&mut operation).await {
                Ok(response) if response.is_success() => {
                    tracing::debug!(attempt, status = response.status(), "attempt succeeded");
                    self.observer
                        .on_event(&LifecycleEvent::succeeded(&response, attempt));
                    return Ok(response);
                }
                Ok(response) | Err(AttemptError::Response(response)) => response,
                Err(AttemptError::Transport(e)) => {
                    tracing::debug!(attempt, error = %e, "transport failure, not retrying");
                    self.observer.on_event(&LifecycleEvent::failed(
                        Failure::Transport(e.as_ref()),
                        None,
                        attempt,
                    ));
                    return Err(RequestError::Transport(e));
                }
            };

            let context = normalize(&response);
            let signal = classify(&context.body, &context.headers);
            let decision = self.options.decide(context.status, attempt, &signal);
            let info = RateLimitInfo::new(&signal, decision.wait(), attempt);
            tracing::debug!(
                attempt,
                status = context.status,
                url = %context.url,
                retry_after_ms = signal.retry_after.as_millis() as u64,
                retry_limit = signal.retry_limit,
                ?decision,
                "attempt failed"
            );

            let failed = LifecycleEvent::failed(Failure::Response(&response), Some(&context), attempt);
            self.observer.on_event(&failed);

            let wait = match decision {
                RetryDecision::RetryAfter(wait) => wait,
                RetryDecision::NotRetryable => {
                    return Err(RequestError::NotRetryable(Box::new(FailedResponse {
                        response,
                        context,
                        rate_limit: None,
                    })));
                }
                RetryDecision::Disabled { .. } => {
                    self.observer.on_event(&failed.rate_limited(&info));
                    return Err(RequestError::RateLimited(Box::new(FailedResponse {
                        response,
                        context,
                        rate_limit: Some(info),
                    })));
                }
                RetryDecision::Exhausted { .. } => {
                    tracing::warn!(
                        attempts = attempt + 1,
                        status = context.status,
                        url = %context.url,
                        "retries exhausted"
                    );
                    return Err(RequestError::Exhausted {
                        attempts: attempt + 1,
                        last: Box::new(FailedResponse {
                            response,
                            context,
                            rate_limit: Some(info),
                        }),
                    });
                }
            };

            tracing::info!(
                attempt,
                status = context.status,
                url = %context.url,
                wait_ms = wait.as_millis() as u64,
                "rate limited, waiting before retry"
            );
            if !self.wait(wait).await {
                return Err(RequestError::Cancelled {
                    attempts: attempt + 1,
                });
            }
            self.observer.on_event(&failed.retrying(&info));
            attempt += 1;
        }
    }

    async fn invoke<F, Fut>(&self, operation: &mut F) -> Result<RawResponse, AttemptError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RawResponse, AttemptError>>,
    {
        match self.options.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, operation()).await {
                Ok(result) => result,
                Err(_) => Err(AttemptError::transport(AttemptTimedOut(limit))),
            },
            None => operation().await,
        }
    }

    /// Sleep for `wait`; false when cancelled first. The timer is dropped
    /// on either path.
    async fn wait(&self, wait: Duration) -> bool {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => true,
                    _ = token.cancelled() => false,
                }
            }
            None => {
                tokio::time::sleep(wait).await;
                true
            }
        }
    }
}

/// Run `operation` with `options`, reporting to `observer`.
pub async fn run_with_retry<O, F, Fut>(
    options: &RetryOptions,
    observer: &O,
    operation: F,
) -> Result<RawResponse, RequestError>
where
    O: Observer + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RawResponse, AttemptError>>,
{
    RetrySession::new(options)
        .with_observer(observer)
        .run(operation)
        .await
}
