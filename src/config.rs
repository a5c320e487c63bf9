//! Runtime settings for the fetch layer and SSRF guard.
//!
//! Settings are built once at start-up (defaults, then an optional config
//! file, then `WDSP_*` environment overrides) and passed down explicitly.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_S: f64 = 5.0;
/// Default read timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_S: f64 = 20.0;
/// Default response size cap in bytes.
pub const DEFAULT_MAX_BYTES: usize = 2_000_000;
/// Default pause between transport retries.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Immutable runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub http_connect_timeout_s: f64,
    pub http_read_timeout_s: f64,
    /// Responses larger than this are rejected after download.
    pub http_max_bytes: usize,
    /// Block URLs that resolve to private/internal addresses.
    /// Only disable when every caller is trusted.
    pub block_private_networks: bool,
    /// User agent configuration.
    /// - None: default browser user agent
    /// - "impersonate": random real browser user agent
    /// - other: custom user agent string
    pub user_agent: Option<String>,
    pub retry_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http_connect_timeout_s: DEFAULT_CONNECT_TIMEOUT_S,
            http_read_timeout_s: DEFAULT_READ_TIMEOUT_S,
            http_max_bytes: DEFAULT_MAX_BYTES,
            block_private_networks: true,
            user_agent: None,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl Settings {
    /// Load settings from a TOML or JSON file (chosen by extension).
    /// Missing keys keep their defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

        let settings: Settings = match ext {
            "json" => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
            _ => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
        };

        Ok(settings)
    }

    /// Load from an optional file, then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let settings = match path {
            Some(p) => Self::load_from_path(p)?,
            None => Self::default(),
        };
        let settings = settings.with_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `WDSP_*` environment variable overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("WDSP_HTTP_CONNECT_TIMEOUT_S").and_then(|v| v.parse().ok()) {
            self.http_connect_timeout_s = v;
        }
        if let Some(v) = lookup("WDSP_HTTP_READ_TIMEOUT_S").and_then(|v| v.parse().ok()) {
            self.http_read_timeout_s = v;
        }
        if let Some(v) = lookup("WDSP_HTTP_MAX_BYTES").and_then(|v| v.parse().ok()) {
            self.http_max_bytes = v;
        }
        if let Some(v) = lookup("WDSP_BLOCK_PRIVATE_NETWORKS") {
            match v.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.block_private_networks = true,
                "0" | "false" | "no" | "off" => self.block_private_networks = false,
                _ => {}
            }
        }
        if let Some(v) = lookup("WDSP_USER_AGENT") {
            if !v.is_empty() {
                self.user_agent = Some(v);
            }
        }
        if let Some(v) = lookup("WDSP_RETRY_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.retry_delay_ms = v;
        }
        self
    }

    /// Validate the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.http_connect_timeout_s > 0.0) {
            return Err("http_connect_timeout_s must be positive".to_string());
        }
        if !(self.http_read_timeout_s > 0.0) {
            return Err("http_read_timeout_s must be positive".to_string());
        }
        if self.http_max_bytes == 0 {
            return Err("http_max_bytes must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.http_connect_timeout_s)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.http_read_timeout_s)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
