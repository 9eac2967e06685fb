//! Player configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file (`PLAYER_CONFIG`, default `player.toml`), then `PLAYER_*` environment
//! variables. A bare `API_URL` replaces the built-in API default.

use crate::player::LoopTimings;
use anyhow::{bail, Context, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:3001";

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    /// Base URL of the signage API.
    pub api_url: String,
    /// Device key bound to this screen.
    pub device_key: String,
    pub poll_interval_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub retry_base_ms: u64,
    pub retry_cap_ms: u64,
    pub transition_ms: u64,
    /// Upper bound for every API request.
    pub request_timeout_secs: u64,
    pub cache_dir: PathBuf,
    pub cache_max_mb: u64,
    /// Command used to show embedded pages, `{url}` is substituted.
    #[serde(default)]
    pub page_command: Option<String>,
    pub fullscreen: bool,
}

impl PlayerConfig {
    /// Load from the config file and the environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var("PLAYER_CONFIG").unwrap_or_else(|_| "player.toml".into());
        let mut builder = Self::defaults()?;
        if let Ok(api_url) = std::env::var("API_URL") {
            builder = builder.set_default("api_url", api_url)?;
        }
        let settings = builder
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix("PLAYER").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;
        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Failed to read configuration")?;
        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>> {
        let cache_dir = std::env::temp_dir().join("signage-player");
        Ok(Config::builder()
            .set_default("api_url", DEFAULT_API_URL)?
            .set_default("device_key", "")?
            .set_default("poll_interval_secs", 30_i64)?
            .set_default("heartbeat_interval_secs", 60_i64)?
            .set_default("retry_base_ms", 5000_i64)?
            .set_default("retry_cap_ms", 30000_i64)?
            .set_default("transition_ms", 500_i64)?
            .set_default("request_timeout_secs", 10_i64)?
            .set_default("cache_dir", cache_dir.to_string_lossy().into_owned())?
            .set_default("cache_max_mb", 512_i64)?
            .set_default("fullscreen", true)?)
    }

    /// Check values the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.device_key.trim().is_empty() {
            bail!("No device key configured (set PLAYER_DEVICE_KEY or pass it as the first argument)");
        }

        let url = Url::parse(&self.api_url)
            .with_context(|| format!("Invalid API URL '{}'", self.api_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("API URL must be http or https, got '{}'", url.scheme());
        }

        for (name, value) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("heartbeat_interval_secs", self.heartbeat_interval_secs),
            ("retry_base_ms", self.retry_base_ms),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if value == 0 {
                bail!("{} must be greater than zero", name);
            }
        }
        if self.retry_cap_ms < self.retry_base_ms {
            bail!("retry_cap_ms must not be below retry_base_ms");
        }
        Ok(())
    }

    pub fn timings(&self) -> LoopTimings {
        LoopTimings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            retry_base: Duration::from_millis(self.retry_base_ms),
            retry_cap: Duration::from_millis(self.retry_cap_ms),
            transition: Duration::from_millis(self.transition_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_max_bytes(&self) -> u64 {
        self.cache_max_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_player_cadences() {
        let cfg = PlayerConfig::from_toml_str("device_key = \"abc123\"").unwrap();
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.timings(), LoopTimings::default());
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert!(cfg.fullscreen);
        assert!(cfg.page_command.is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn file_values_override_defaults() {
        let cfg = PlayerConfig::from_toml_str(
            r#"
            api_url = "https://signage.example.com"
            device_key = "lobby"
            poll_interval_secs = 10
            page_command = "chromium --kiosk {url}"
            fullscreen = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.api_url, "https://signage.example.com");
        assert_eq!(cfg.timings().poll_interval, Duration::from_secs(10));
        assert_eq!(cfg.page_command.as_deref(), Some("chromium --kiosk {url}"));
        assert!(!cfg.fullscreen);
    }

    #[test]
    fn rejects_missing_key_and_bad_url() {
        let cfg = PlayerConfig::from_toml_str("").unwrap();
        assert!(cfg.validate().is_err());

        let cfg = PlayerConfig::from_toml_str("device_key = \"k\"\napi_url = \"ftp://x\"").unwrap();
        assert!(cfg.validate().is_err());

        let cfg =
            PlayerConfig::from_toml_str("device_key = \"k\"\nheartbeat_interval_secs = 0").unwrap();
        assert!(cfg.validate().is_err());
    }
}
