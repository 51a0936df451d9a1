use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::BackoffKind;
use crate::transport::CurlOptions;

/// libcurl transport settings (optional `[transport]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Seconds allowed for establishing a connection.
    pub connect_timeout_secs: u64,
    /// Hard limit for a whole transfer in seconds (None = no limit).
    pub timeout_secs: Option<u64>,
    pub follow_redirects: bool,
    /// Close every connection after its transfer instead of pooling it.
    pub disable_keep_alives: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: None,
            follow_redirects: true,
            disable_keep_alives: false,
        }
    }
}

impl TransportConfig {
    pub fn to_curl_options(&self) -> CurlOptions {
        CurlOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            timeout: self.timeout_secs.map(Duration::from_secs),
            follow_redirects: self.follow_redirects,
            keep_alive: !self.disable_keep_alives,
            ..CurlOptions::default()
        }
    }
}

/// Client configuration loaded from `~/.config/retryhttp/config.toml`.
///
/// Every key is optional; missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Shortest wait between attempts, in seconds (e.g. 0.25 = 250ms).
    pub retry_wait_min_secs: f64,
    /// Longest wait between attempts, in seconds.
    pub retry_wait_max_secs: f64,
    /// "exponential" (default) or "linear_jitter".
    pub backoff: BackoffKind,
    /// Bytes read from a discarded response before it is closed.
    pub response_drain_limit: u64,
    /// Statuses retried on top of 5xx and connection errors, e.g. `[429]`.
    pub retry_statuses: Vec<u32>,
    pub transport: Option<TransportConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            retry_wait_min_secs: 1.0,
            retry_wait_max_secs: 30.0,
            backoff: BackoffKind::Exponential,
            response_drain_limit: 4096,
            retry_statuses: Vec::new(),
            transport: None,
        }
    }
}

impl ClientConfig {
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("retryhttp")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ClientConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ClientConfig::default();
        let toml = default_cfg.to_toml()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file. The file must exist.
pub fn load_from_path(path: &Path) -> Result<ClientConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: ClientConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}
