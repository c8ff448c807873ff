//! `graceful backoff` – print the default policy's delay table.

use graceful_core::retry::{BackoffPolicy, ExponentialBackoff, DEFAULT_BASE_DELAY};
use std::time::Duration;

pub fn run_backoff(status: u16, attempts: u32, ceiling_secs: u64) {
    let policy = ExponentialBackoff::new(DEFAULT_BASE_DELAY, Duration::from_secs(ceiling_secs));
    println!("{:<8} {}", "ATTEMPT", "DELAY");
    for attempt in 0..attempts {
        let delay = policy.compute_delay(status, attempt);
        let shown = if delay.is_zero() {
            "stop".to_string()
        } else {
            format!("{}ms", delay.as_millis())
        };
        println!("{:<8} {}", attempt, shown);
        if delay.is_zero() {
            break;
        }
    }
}
