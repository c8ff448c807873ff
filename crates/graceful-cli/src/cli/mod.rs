//! CLI for the graceful retry engine.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use graceful_core::config;

use commands::{run_backoff, run_classify, run_fetch};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "graceful")]
#[command(about = "graceful: rate-limit aware HTTP retries", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Send a request, retrying while the server asks to wait.
    Fetch(FetchArgs),

    /// Show the rate-limit signal found in a response's headers and body.
    Classify {
        /// Response header as 'Name: value'. Repeatable.
        #[arg(long = "header", short = 'H', value_name = "HEADER")]
        headers: Vec<String>,
        /// Response body as JSON.
        #[arg(long)]
        body: Option<String>,
    },

    /// Print the default backoff delay for successive attempts.
    Backoff {
        /// HTTP status the delays are computed for.
        #[arg(long, default_value = "429")]
        status: u16,
        /// Number of attempts to show.
        #[arg(long, default_value = "8", value_name = "N")]
        attempts: u32,
        /// Backoff ceiling in seconds.
        #[arg(long, default_value = "32", value_name = "SECS")]
        ceiling: u64,
    },
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Absolute HTTP/HTTPS URL, or a path when --base-url is given.
    pub url: String,
    /// Prefix joined in front of a relative URL.
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
    #[arg(long, short = 'X', default_value = "GET")]
    pub method: String,
    /// Request header as 'Name: value'. Repeatable.
    #[arg(long = "header", short = 'H', value_name = "HEADER")]
    pub headers: Vec<String>,
    /// Request body.
    #[arg(long, short = 'd')]
    pub data: Option<String>,
    /// Use the buffered client (non-2xx rejected, body parsed eagerly).
    #[arg(long)]
    pub buffered: bool,
    /// Fail on the first rate-limited response instead of waiting.
    #[arg(long)]
    pub no_retry: bool,
    /// Backoff ceiling in seconds (overrides config).
    #[arg(long, value_name = "SECS")]
    pub ceiling: Option<u64>,
    /// Also retry 429/503/504 without a server hint, using exponential backoff.
    #[arg(long)]
    pub status_backoff: bool,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Fetch(args) => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_fetch(&cfg, args).await?
            }
            CliCommand::Classify { headers, body } => run_classify(&headers, body.as_deref())?,
            CliCommand::Backoff {
                status,
                attempts,
                ceiling,
            } => run_backoff(status, attempts, ceiling),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
