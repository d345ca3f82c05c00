//! Shared configuration for the poolside CLI.
//!
//! TOML file + `POOLSIDE_*` environment overlay, credential resolution,
//! and translation to `poolside_core::CoordinatorConfig`. Validation
//! rejects out-of-range values instead of clamping them -- a config error
//! at startup beats a silently adjusted poll cadence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use poolside_core::CoordinatorConfig;

/// Production cloud endpoint; override with `base_url` for testing.
pub const DEFAULT_BASE_URL: &str = "https://app1.haywardomnilogic.com/api/v1";

/// The cloud poll cadence floor. Faster polling trips the service's rate
/// limiting.
const MIN_POLL_INTERVAL_SECS: u64 = 10;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured (set username/password in the config file or POOLSIDE_USERNAME / POOLSIDE_PASSWORD)")]
    NoCredentials,

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config struct ───────────────────────────────────────────────────

/// Top-level configuration: credentials, cloud endpoint, poll tuning,
/// and water-chemistry calibration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// OmniLogic account username (email).
    pub username: Option<String>,

    /// Account password (plaintext -- prefer `POOLSIDE_PASSWORD`).
    pub password: Option<String>,

    /// Cloud API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Seconds between telemetry polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Per-poll fetch timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Calibration offset added to the raw pH reading.
    #[serde(default)]
    pub ph_offset: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            base_url: default_base_url(),
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            ph_offset: 0.0,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}
fn default_poll_interval() -> u64 {
    30
}
fn default_request_timeout() -> u64 {
    30
}

impl Config {
    /// Reject out-of-range values. Never clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs < MIN_POLL_INTERVAL_SECS {
            return Err(ConfigError::Validation {
                field: "poll_interval_secs".into(),
                reason: format!(
                    "{} is below the {MIN_POLL_INTERVAL_SECS}s cloud polling floor",
                    self.poll_interval_secs
                ),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "request_timeout_secs".into(),
                reason: "must be at least 1".into(),
            });
        }
        if !(-14.0..=14.0).contains(&self.ph_offset) {
            return Err(ConfigError::Validation {
                field: "ph_offset".into(),
                reason: format!("{} is outside the pH scale -14..=14", self.ph_offset),
            });
        }
        self.parsed_base_url().map(|_| ())
    }

    pub fn parsed_base_url(&self) -> Result<url::Url, ConfigError> {
        self.base_url.parse().map_err(|_| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("invalid URL: {}", self.base_url),
        })
    }

    /// Username + password, both required. The environment overlay has
    /// already been merged by the time this runs.
    pub fn credentials(&self) -> Result<(String, SecretString), ConfigError> {
        let username = self.username.clone().ok_or(ConfigError::NoCredentials)?;
        let password = self.password.clone().ok_or(ConfigError::NoCredentials)?;
        Ok((username, SecretString::from(password)))
    }

    /// Poll tuning handed to the coordinator.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ph_offset: self.ph_offset,
            ..CoordinatorConfig::default()
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "poolside", "poolside").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("poolside.toml");
            p
        },
        |dirs| dirs.config_dir().join("poolside.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("poolside");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load and validate configuration from the canonical path plus the
/// `POOLSIDE_*` environment overlay.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load and validate configuration from an explicit file path. A missing
/// file is fine -- defaults plus environment still apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("POOLSIDE_"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}
