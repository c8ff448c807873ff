use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::classify::RateLimitSignal;

/// Statuses conventionally tied to rate limiting or temporary unavailability.
pub const THROTTLE_STATUSES: [u16; 3] = [429, 503, 504];

/// Default ceiling on a computed backoff delay.
pub const DEFAULT_BACKOFF_CEILING: Duration = Duration::from_secs(32);

/// Default growth base for the exponential policy.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound of the jitter added to a computed delay, in milliseconds.
const JITTER_MAX_MS: u64 = 1000;

pub fn is_throttle_status(status: u16) -> bool {
    THROTTLE_STATUSES.contains(&status)
}

/// Maps `(status, attempt)` to a wait. Zero means "stop".
///
/// Any `Fn(u16, u32) -> Duration` closure is a policy.
pub trait BackoffPolicy: Send + Sync {
    fn compute_delay(&self, status: u16, attempt: u32) -> Duration;
}

impl<F> BackoffPolicy for F
where
    F: Fn(u16, u32) -> Duration + Send + Sync,
{
    fn compute_delay(&self, status: u16, attempt: u32) -> Duration {
        self(status, attempt)
    }
}

/// Exponential backoff with jitter, capped at a ceiling.
///
/// `step + jitter`, clamped to `ceiling`, where `step = base * 2^attempt` and
/// the jitter is drawn from `cap/2..=cap` with `cap = min(step, 1000ms)`.
/// Keeping the jitter no larger than the step makes delays non-decreasing in
/// `attempt` for any base. A delay that reaches the ceiling is returned as
/// zero: the caller gives up instead of waiting the maximum.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub ceiling: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_DELAY,
            ceiling: DEFAULT_BACKOFF_CEILING,
        }
    }
}

impl ExponentialBackoff {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self { base, ceiling }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn compute_delay(&self, status: u16, attempt: u32) -> Duration {
        if !is_throttle_status(status) {
            return Duration::ZERO;
        }
        let base_ms = millis(self.base);
        let ceiling_ms = millis(self.ceiling);

        let exp = 1u64 << attempt.min(32);
        let step_ms = base_ms.saturating_mul(exp);
        let cap = step_ms.min(JITTER_MAX_MS);
        let jitter = rand::rng().random_range(cap / 2..=cap);
        let delay_ms = step_ms.saturating_add(jitter).min(ceiling_ms);

        if delay_ms >= ceiling_ms {
            return Duration::ZERO;
        }
        Duration::from_millis(delay_ms)
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Which failures are eligible for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryRule {
    /// A positive server wait hint is present.
    #[default]
    Signal,
    /// A wait hint is present and the server reports quota remaining.
    QuotaAndSignal,
    /// A wait hint is present, or the status is a throttle status and the
    /// backoff policy supplies the wait.
    SignalOrStatus,
}

/// Outcome of one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Not eligible under the configured rule.
    NotRetryable,
    /// Eligible, but retries are switched off; `wait` is what would apply.
    Disabled { wait: Duration },
    /// Eligible, but the wait resolved to zero or the retry limit is spent.
    Exhausted { wait: Duration },
    /// Sleep this long, then try again.
    RetryAfter(Duration),
}

impl RetryDecision {
    pub fn wait(&self) -> Duration {
        match self {
            RetryDecision::NotRetryable => Duration::ZERO,
            RetryDecision::Disabled { wait }
            | RetryDecision::Exhausted { wait }
            | RetryDecision::RetryAfter(wait) => *wait,
        }
    }
}

/// Per-call retry settings.
#[derive(Clone)]
pub struct RetryOptions {
    pub enable_retry: bool,
    /// Ceiling for the built-in policy. Ignored when a custom policy is set.
    pub backoff_ceiling: Duration,
    /// Growth base for the built-in policy.
    pub base_delay: Duration,
    /// Replaces the built-in policy entirely when set.
    pub backoff_policy: Option<Arc<dyn BackoffPolicy>>,
    pub rule: RetryRule,
    /// An attempt still pending after this long fails as a transport error.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            enable_retry: true,
            backoff_ceiling: DEFAULT_BACKOFF_CEILING,
            base_delay: DEFAULT_BASE_DELAY,
            backoff_policy: None,
            rule: RetryRule::default(),
            attempt_timeout: None,
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("enable_retry", &self.enable_retry)
            .field("backoff_ceiling", &self.backoff_ceiling)
            .field("base_delay", &self.base_delay)
            .field("custom_backoff", &self.backoff_policy.is_some())
            .field("rule", &self.rule)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

impl RetryOptions {
    pub fn with_backoff<P: BackoffPolicy + 'static>(mut self, policy: P) -> Self {
        self.backoff_policy = Some(Arc::new(policy));
        self
    }

    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.backoff_ceiling = ceiling;
        self
    }

    pub fn with_rule(mut self, rule: RetryRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_retry_enabled(mut self, enabled: bool) -> Self {
        self.enable_retry = enabled;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Backoff delay from the custom policy, or the built-in one.
    pub fn delay_for(&self, status: u16, attempt: u32) -> Duration {
        match &self.backoff_policy {
            Some(policy) => policy.compute_delay(status, attempt),
            None => ExponentialBackoff::new(self.base_delay, self.backoff_ceiling)
                .compute_delay(status, attempt),
        }
    }

    fn is_eligible(&self, status: u16, signal: &RateLimitSignal) -> bool {
        match self.rule {
            RetryRule::Signal => signal.is_retryable(),
            RetryRule::QuotaAndSignal => {
                signal.is_retryable() && signal.rate_limit_remaining > 0
            }
            RetryRule::SignalOrStatus => signal.is_retryable() || is_throttle_status(status),
        }
    }

    /// Decide what to do after attempt `attempt` (0-based) failed with
    /// `status` and produced `signal`.
    ///
    /// The server's wait wins when non-zero; otherwise the backoff policy
    /// supplies it. A retry needs a positive wait and either
    /// `attempt < retry_limit` or no classified limit at all.
    pub fn decide(&self, status: u16, attempt: u32, signal: &RateLimitSignal) -> RetryDecision {
        if !self.is_eligible(status, signal) {
            return RetryDecision::NotRetryable;
        }
        let wait = if signal.is_retryable() {
            signal.retry_after
        } else {
            self.delay_for(status, attempt)
        };
        if !self.enable_retry {
            return RetryDecision::Disabled { wait };
        }
        if wait.is_zero() {
            return RetryDecision::Exhausted { wait };
        }
        if attempt < signal.retry_limit || signal.retry_limit == 0 {
            RetryDecision::RetryAfter(wait)
        } else {
            RetryDecision::Exhausted { wait }
        }
    }
}
