//! `graceful classify` – show what the classifier reads from a response.

use anyhow::{Context, Result};
use graceful_core::normalize::lowercase_headers;
use graceful_core::retry::classify;
use serde_json::Value;

use super::parse_header_arg;

pub fn run_classify(raw_headers: &[String], body: Option<&str>) -> Result<()> {
    let pairs = raw_headers
        .iter()
        .map(|h| parse_header_arg(h))
        .collect::<Result<Vec<_>>>()?;
    let headers = lowercase_headers(pairs.iter().map(|(k, v)| (k, v)));
    let body: Value = match body {
        Some(raw) => serde_json::from_str(raw).context("--body is not valid JSON")?,
        None => Value::Null,
    };

    let signal = classify(&body, &headers);
    println!("retryable:   {}", signal.is_retryable());
    println!("retry after: {:.3}s", signal.retry_after.as_secs_f64());
    println!("retry limit: {}", signal.retry_limit);
    println!("remaining:   {}", signal.rate_limit_remaining);
    println!("reset in:    {}s", signal.reset_at.delta_secs);
    println!("global:      {}", signal.global);
    if let Some(scope) = &signal.scope {
        println!("scope:       {}", scope);
    }
    if let Some(message) = &signal.message {
        println!("message:     {}", message);
    }
    Ok(())
}
