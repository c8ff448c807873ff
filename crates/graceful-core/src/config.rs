use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::{RetryOptions, RetryRule, DEFAULT_BACKOFF_CEILING, DEFAULT_BASE_DELAY};

/// Retry parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// When false, a rate-limited response fails at once with its metadata.
    pub enable_retry: bool,
    /// Computed backoff delays at or above this stop retrying.
    pub backoff_ceiling_secs: u64,
    /// Growth base for the exponential policy, in milliseconds.
    pub base_delay_ms: u64,
    /// Which failures may be retried: "signal", "quota-and-signal" or "signal-or-status".
    #[serde(default)]
    pub rule: RetryRule,
    /// Per-attempt timeout; a slower attempt fails as a transport error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_timeout_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enable_retry: true,
            backoff_ceiling_secs: DEFAULT_BACKOFF_CEILING.as_secs(),
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            rule: RetryRule::Signal,
            attempt_timeout_secs: None,
        }
    }
}

impl RetryConfig {
    pub fn to_options(&self) -> RetryOptions {
        let mut options = RetryOptions::default()
            .with_retry_enabled(self.enable_retry)
            .with_ceiling(Duration::from_secs(self.backoff_ceiling_secs))
            .with_rule(self.rule);
        options.base_delay = Duration::from_millis(self.base_delay_ms);
        if let Some(secs) = self.attempt_timeout_secs {
            options = options.with_attempt_timeout(Duration::from_secs(secs));
        }
        options
    }
}

/// Timeouts for the curl transport (optional `[http]` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Whole-transfer timeout enforced by libcurl.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            timeout_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/graceful/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GracefulConfig {
    /// Optional retry settings; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub http: Option<HttpConfig>,
}

impl GracefulConfig {
    pub fn retry_options(&self) -> RetryOptions {
        self.retry.clone().unwrap_or_default().to_options()
    }

    pub fn http(&self) -> HttpConfig {
        self.http.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("graceful")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GracefulConfig> {
    let path = config_path()?;
    load_from(&path)
}

/// Like [`load_or_init`], for an explicit path.
pub fn load_from(path: &Path) -> Result<GracefulConfig> {
    if !path.exists() {
        let default_cfg = GracefulConfig {
            retry: Some(RetryConfig::default()),
            http: Some(HttpConfig::default()),
        };
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)
            .with_context(|| format!("writing default config to {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: GracefulConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}
