//! Extract rate-limit signals from a failed response's body and headers.
//!
//! The classifier is signal-driven: a response is retry-eligible when it
//! carries a resolvable wait hint, whatever its status code. Malformed input
//! never errors; it simply reads as "no signal".

use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Body field names, in the camelCase servers send them.
const BODY_RETRY_AFTER: &str = "retryAfter";
const BODY_RETRY_LIMIT: &str = "retryLimit";
const BODY_REMAINING: &str = "rateLimitRemaining";
const BODY_RESET: &str = "rateLimitReset";
const BODY_GLOBAL: &str = "global";
const BODY_MESSAGE: &str = "message";

/// Header names (already lower-cased by normalization).
const HEADER_RETRY_AFTER: &str = "retry-after";
const HEADER_LIMIT: &str = "x-ratelimit-limit";
const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RESET: &str = "x-ratelimit-reset";
const HEADER_RESET_AFTER: &str = "x-ratelimit-reset-after";
const HEADER_GLOBAL: &str = "x-ratelimit-global";
const HEADER_SCOPE: &str = "x-ratelimit-scope";

/// When the server's quota resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetAt {
    pub time: SystemTime,
    pub delta_secs: u64,
}

/// Quantitative rate-limit hints plus the retry verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSignal {
    /// Server-requested wait (zero = no hint).
    pub retry_after: Duration,
    /// How many retries the server allows; 1 when only a wait was sent.
    pub retry_limit: u32,
    pub rate_limit_remaining: u32,
    pub reset_at: ResetAt,
    /// Server flagged the limit as global rather than per-route.
    pub global: bool,
    pub scope: Option<String>,
    pub message: Option<String>,
}

impl RateLimitSignal {
    /// True when a positive wait hint was found.
    pub fn is_retryable(&self) -> bool {
        !self.retry_after.is_zero()
    }
}

/// Rate-limit metadata attached to events and errors once a wait is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// The wait actually chosen (server hint or backoff policy).
    pub retry_after: Duration,
    pub retry_limit: u32,
    pub rate_limit_remaining: u32,
    pub reset_at: ResetAt,
    pub global: bool,
    pub scope: Option<String>,
    /// 0-based attempt this info was computed for.
    pub attempt: u32,
}

impl RateLimitInfo {
    pub fn new(signal: &RateLimitSignal, wait: Duration, attempt: u32) -> Self {
        Self {
            retry_after: wait,
            retry_limit: signal.retry_limit,
            rate_limit_remaining: signal.rate_limit_remaining,
            reset_at: signal.reset_at,
            global: signal.global,
            scope: signal.scope.clone(),
            attempt,
        }
    }

    /// Retries still allowed after `attempt` (0 when no limit was sent).
    pub fn retries_left(&self) -> u32 {
        self.retry_limit.saturating_sub(self.attempt)
    }
}

/// Classify against the current wall clock.
pub fn classify(body: &Value, headers: &HashMap<String, String>) -> RateLimitSignal {
    classify_at(body, headers, SystemTime::now())
}

/// Classify with an explicit `now`; a pure function of its inputs.
///
/// Each field is taken from the body when present there, otherwise from the
/// matching header. Header names match case-insensitively.
///
/// A body `retryAfter` is seconds with millisecond precision; a
/// `Retry-After` header counts whole seconds and drops any fraction.
pub fn classify_at(
    body: &Value,
    headers: &HashMap<String, String>,
    now: SystemTime,
) -> RateLimitSignal {
    let header = |name: &str| header_value(headers, name);

    // A zero in the body is no hint at all; let the header speak.
    let retry_after = body_number(body, BODY_RETRY_AFTER)
        .map(wait_from_secs)
        .filter(|d| !d.is_zero())
        .or_else(|| {
            header(HEADER_RETRY_AFTER)
                .and_then(parse_number)
                .map(|v| Duration::from_secs(v.trunc() as u64))
        })
        .unwrap_or(Duration::ZERO);

    let mut retry_limit = body_count(body, BODY_RETRY_LIMIT)
        .or_else(|| header(HEADER_LIMIT).and_then(parse_count))
        .unwrap_or(0);
    if !retry_after.is_zero() && retry_limit == 0 {
        retry_limit = 1;
    }

    let rate_limit_remaining = body_count(body, BODY_REMAINING)
        .or_else(|| header(HEADER_REMAINING).and_then(parse_count))
        .unwrap_or(0);

    let delta_secs = body_secs(body, BODY_RESET)
        .or_else(|| header(HEADER_RESET).and_then(parse_secs))
        .or_else(|| header(HEADER_RESET_AFTER).and_then(parse_secs))
        .unwrap_or(0);
    let time = now
        .checked_add(Duration::from_secs(delta_secs))
        .unwrap_or(now);

    let global = body
        .get(BODY_GLOBAL)
        .and_then(Value::as_bool)
        .or_else(|| header(HEADER_GLOBAL).map(|v| !v.eq_ignore_ascii_case("false")))
        .unwrap_or(false);

    RateLimitSignal {
        retry_after,
        retry_limit,
        rate_limit_remaining,
        reset_at: ResetAt { time, delta_secs },
        global,
        scope: header(HEADER_SCOPE).map(str::to_string),
        message: body
            .get(BODY_MESSAGE)
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Exact (lower-case) key first, then any casing.
fn header_value<'h>(headers: &'h HashMap<String, String>, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .or_else(|| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

/// Non-negative finite value from a JSON number or numeric string.
fn body_number(body: &Value, key: &str) -> Option<f64> {
    match body.get(key)? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite() && *v >= 0.0),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Seconds to a wait, rounded up to the next millisecond.
fn wait_from_secs(secs: f64) -> Duration {
    Duration::from_millis((secs * 1000.0).ceil() as u64)
}

/// Whole seconds from a JSON number or numeric string; fractions round up.
fn body_secs(body: &Value, key: &str) -> Option<u64> {
    body_number(body, key).and_then(secs_from_f64)
}

fn body_count(body: &Value, key: &str) -> Option<u32> {
    body_secs(body, key).map(|n| n.min(u32::MAX as u64) as u32)
}

fn parse_secs(raw: &str) -> Option<u64> {
    parse_number(raw).and_then(secs_from_f64)
}

fn parse_count(raw: &str) -> Option<u32> {
    parse_secs(raw).map(|n| n.min(u32::MAX as u64) as u32)
}

fn secs_from_f64(v: f64) -> Option<u64> {
    if !v.is_finite() || v < 0.0 {
        return None;
    }
    Some(v.ceil().min(u64::MAX as f64) as u64)
}
