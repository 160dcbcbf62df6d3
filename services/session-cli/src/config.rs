//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The sign-in password is read from SESSION_PASSWORD or `--password`,
//! never from the TOML, so it does not end up in a file on disk.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// Credential-issuing service
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    pub url: String,
}

/// Resource API reached through the authenticated client
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Where the session token is persisted
#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// Defaults to `<data_local_dir>/session-cli`
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Proactive background refresh
#[derive(Debug, Deserialize)]
pub struct RefreshConfig {
    #[serde(default)]
    pub proactive: bool,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_threshold")]
    pub threshold_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            proactive: false,
            interval_secs: default_interval(),
            threshold_secs: default_threshold(),
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_secs)
    }
}

fn default_timeout() -> u64 {
    8
}

fn default_interval() -> u64 {
    60
}

fn default_threshold() -> u64 {
    300
}

const APP_DIR: &str = "session-cli";

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        validate_url("auth.url", &config.auth.url)?;
        validate_url("api.url", &config.api.url)?;

        if config.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        if config.refresh.interval_secs == 0 {
            return Err(common::Error::Config(
                "refresh.interval_secs must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("session-cli.toml")
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Token storage directory: configured, or the platform data directory.
    pub fn storage_dir(&self) -> common::Result<PathBuf> {
        if let Some(dir) = &self.storage.dir {
            return Ok(dir.clone());
        }
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR))
            .ok_or_else(|| {
                common::Error::Config(
                    "no platform data directory, set storage.dir explicitly".into(),
                )
            })
    }
}

fn validate_url(field: &str, url: &str) -> common::Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {url}"
        )))
    }
}

/// Resolve the sign-in password: SESSION_PASSWORD env var, then the CLI flag.
pub fn resolve_password(cli_password: Option<&str>) -> Option<Secret<String>> {
    match std::env::var("SESSION_PASSWORD") {
        Ok(password) if !password.is_empty() => return Some(Secret::new(password)),
        _ => {}
    }
    cli_password
        .filter(|p| !p.is_empty())
        .map(|p| Secret::new(p.to_string()))
}
