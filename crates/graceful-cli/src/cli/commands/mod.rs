//! CLI command handlers. Each command is in its own file.

mod backoff;
mod classify;
mod fetch;

pub use backoff::run_backoff;
pub use classify::run_classify;
pub use fetch::run_fetch;

use anyhow::{bail, Result};

/// Split a `Name: value` argument.
pub(crate) fn parse_header_arg(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => bail!("invalid header {:?}, expected 'Name: value'", raw),
    }
}
