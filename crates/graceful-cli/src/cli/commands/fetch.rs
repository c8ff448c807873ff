//! `graceful fetch` – send one request through a retry session.

use anyhow::{Context, Result};
use graceful_core::config::GracefulConfig;
use graceful_core::normalize::RawResponse;
use graceful_core::retry::{run_with_retry, LifecycleEvent, Phase, RetryOptions, RetryRule};
use graceful_core::transport::{send_buffered, send_streamed, CurlRequest};
use std::time::Duration;

use super::parse_header_arg;
use crate::cli::FetchArgs;

pub async fn run_fetch(cfg: &GracefulConfig, args: FetchArgs) -> Result<()> {
    let options = fetch_options(cfg, &args);
    tracing::debug!(?options, "fetch options");

    let mut req = CurlRequest::new(&args.method, &args.url).with_timeouts(&cfg.http());
    if let Some(base) = &args.base_url {
        req = req.with_base_url(base);
    }
    for raw in &args.headers {
        let (name, value) = parse_header_arg(raw)?;
        req = req.with_header(name, value);
    }
    if let Some(data) = args.data {
        req = req.with_body(data);
    }
    let target = req.full_url();

    let observer = |event: &LifecycleEvent<'_>| print_event(event);
    let result = if args.buffered {
        run_with_retry(&options, &observer, || send_buffered(req.clone())).await
    } else {
        run_with_retry(&options, &observer, || send_streamed(req.clone())).await
    };

    let resp = result.with_context(|| format!("{} {} failed", req.method, target))?;
    print_body(&resp)
}

fn fetch_options(cfg: &GracefulConfig, args: &FetchArgs) -> RetryOptions {
    let mut options = cfg.retry_options();
    if args.no_retry {
        options = options.with_retry_enabled(false);
    }
    if let Some(secs) = args.ceiling {
        options = options.with_ceiling(Duration::from_secs(secs));
    }
    if args.status_backoff {
        options = options.with_rule(RetryRule::SignalOrStatus);
    }
    options
}

fn print_event(event: &LifecycleEvent<'_>) {
    let n = event.attempt + 1;
    match event.phase() {
        Phase::Loading => eprintln!("[{}] sending", n),
        Phase::Succeeded => {
            if let Some(resp) = event.response {
                eprintln!("[{}] HTTP {}", n, resp.status());
            }
        }
        Phase::Failed => {
            if let Some(err) = &event.error {
                eprintln!("[{}] {}", n, err);
            }
        }
        Phase::RateLimited => {
            if let Some(info) = event.rate_limit {
                eprintln!(
                    "[{}] rate limited, server asks to wait {}s (retries disabled)",
                    n,
                    info.retry_after.as_secs()
                );
            }
        }
        Phase::Retrying => {
            if let Some(info) = event.rate_limit {
                eprintln!(
                    "[{}] waited {:.1}s, retrying ({} of {} retries left)",
                    n,
                    info.retry_after.as_secs_f64(),
                    info.retries_left(),
                    info.retry_limit
                );
            }
        }
    }
}

fn print_body(resp: &RawResponse) -> Result<()> {
    match resp {
        RawResponse::Streamed(r) => println!("{}", String::from_utf8_lossy(r.body_bytes())),
        RawResponse::Buffered(r) => println!("{}", serde_json::to_string_pretty(&r.data)?),
    }
    Ok(())
}
