//! Configuration file handling
//!
//! Loaded from TOML; every field has a default so a partial (or missing)
//! file is fine.
//!
//! ```toml
//! db_path = "/var/lib/rusty-forex/forex_data.db"
//! timezone = "Europe/London"
//!
//! [upstream]
//! timeout_secs = 15
//!
//! [refresh]
//! interval_hours = 24
//! pairs = ["GBP/INR", "AED/INR"]
//! periods = ["1W", "1M", "3M", "6M", "1Y"]
//! ```

use crate::error::{ForexError, Result};
use crate::period::Period;
use crate::types::CurrencyPair;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart/";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// IANA zone daily bars and periods are computed in
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Remember days the upstream has no data for instead of re-requesting them
    #[serde(default = "default_true")]
    pub mark_empty_days: bool,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// Upstream provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Background refresh settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
    #[serde(default = "default_pairs")]
    pub pairs: Vec<String>,
    #[serde(default = "default_periods")]
    pub periods: Vec<String>,
}

fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rusty-forex")
}

fn default_db_path() -> PathBuf {
    app_dir().join("forex_data.db")
}

fn default_timezone() -> String {
    "Europe/London".to_string()
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_interval_hours() -> u64 {
    24
}

/// Longest accepted refresh interval, one year
pub const MAX_INTERVAL_HOURS: u64 = 24 * 365;

fn default_pairs() -> Vec<String> {
    vec!["GBP/INR".to_string(), "AED/INR".to_string()]
}

fn default_periods() -> Vec<String> {
    Period::ALL.iter().map(|p| p.as_str().to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            timezone: default_timezone(),
            mark_empty_days: true,
            upstream: UpstreamConfig::default(),
            refresh: RefreshConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
            pairs: default_pairs(),
            periods: default_periods(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.clamp(1, MAX_INTERVAL_HOURS) * 3600)
    }

    pub fn parsed_pairs(&self) -> Result<Vec<CurrencyPair>> {
        self.pairs
            .iter()
            .map(|p| {
                p.parse::<CurrencyPair>()
                    .map_err(|e| ForexError::Config(format!("refresh.pairs: {}", e)))
            })
            .collect()
    }

    pub fn parsed_periods(&self) -> Result<Vec<Period>> {
        self.periods
            .iter()
            .map(|p| {
                Period::parse(p).map_err(|e| ForexError::Config(format!("refresh.periods: {}", e)))
            })
            .collect()
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        app_dir().join("config.toml")
    }

    /// File a load with `explicit` reads from: the explicit path, else the default location
    pub fn source_path(explicit: Option<&Path>) -> PathBuf {
        explicit.map_or_else(Self::default_path, Path::to_path_buf)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist; without one the default location is tried
    /// and defaults are used when it is absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let source = Self::source_path(path);
        if !source.exists() {
            if path.is_some() {
                return Err(ForexError::Config(format!(
                    "Config file not found: {}",
                    source.display()
                )));
            }
            log::debug!("No config at {}, using defaults", source.display());
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&source)?;
        let config = Self::from_toml(&contents)
            .map_err(|e| ForexError::Config(format!("{}: {}", source.display(), e)))?;
        log::debug!("Loaded config from {}", source.display());
        Ok(config)
    }

    /// Parse and validate TOML contents
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| ForexError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        self.refresh.parsed_pairs()?;
        self.refresh.parsed_periods()?;
        if self.refresh.interval_hours == 0 || self.refresh.interval_hours > MAX_INTERVAL_HOURS {
            return Err(ForexError::Config(format!(
                "refresh.interval_hours must be between 1 and {}, got {}",
                MAX_INTERVAL_HOURS, self.refresh.interval_hours
            )));
        }
        if self.upstream.base_url.trim().is_empty() {
            return Err(ForexError::Config("upstream.base_url is empty".to_string()));
        }
        Ok(())
    }

    /// Reference time zone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ForexError::Config(format!("Invalid timezone '{}': {}", self.timezone, e)))
    }

    /// Create the directory holding the database
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
