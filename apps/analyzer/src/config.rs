use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::client::ReadinessSettings;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub storage_root: PathBuf,
    pub anthropic_api_key: String,
    pub local_username: String,
    pub pdftoppm_bin: String,
    pub poll_interval_ms: u64,
    pub load_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            storage_root: std::env::var("STORAGE_ROOT")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            local_username: std::env::var("LOCAL_USERNAME").unwrap_or_else(|_| "local".to_string()),
            pdftoppm_bin: std::env::var("PDFTOPPM_BIN").unwrap_or_else(|_| "pdftoppm".to_string()),
            poll_interval_ms: parse_env("PLATFORM_POLL_INTERVAL_MS", 100)?,
            load_timeout_ms: parse_env("PLATFORM_LOAD_TIMEOUT_MS", 10_000)?,
        })
    }

    pub fn readiness(&self) -> ReadinessSettings {
        ReadinessSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            load_timeout: Duration::from_millis(self.load_timeout_ms),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
