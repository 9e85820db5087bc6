pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tcflow_cloud::ratelimit::{DEFAULT_CALLS_PER_SECOND, RateLimiter};
use tcflow_cloud::retry::{READ_RETRY_TIMEOUT, RetryPolicy, WRITE_RETRY_TIMEOUT};
use tcflow_cloud::waiter::DEFAULT_POLL_INTERVAL;

pub const CONFIG_PATH_ENV: &str = "TCFLOW_CONFIG_PATH";
pub const WRITE_TIMEOUT_ENV: &str = "TCFLOW_WRITE_RETRY_TIMEOUT";
pub const READ_TIMEOUT_ENV: &str = "TCFLOW_READ_RETRY_TIMEOUT";

/// Provider-wide timing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Retry budget of mutating calls, in seconds
    pub write_retry_timeout_secs: u64,

    /// Retry budget of read calls, in seconds
    pub read_retry_timeout_secs: u64,

    /// Pause between convergence polls, in milliseconds
    pub poll_interval_ms: u64,

    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Calls per second per API action; 0 disables throttling
    pub default_per_second: u32,

    /// Per-action overrides
    pub actions: BTreeMap<String, u32>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            write_retry_timeout_secs: WRITE_RETRY_TIMEOUT.as_secs(),
            read_retry_timeout_secs: READ_RETRY_TIMEOUT.as_secs(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_per_second: DEFAULT_CALLS_PER_SECOND,
            actions: BTreeMap::new(),
        }
    }
}

impl ProviderConfig {
    /// Load from the first config file found, falling back to defaults, then apply env overrides
    pub fn load() -> Result<Self> {
        let mut config = match find_config_file()? {
            Some(path) => Self::from_file(&path)?,
            None => {
                tracing::debug!("no config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Override timeouts from `TCFLOW_WRITE_RETRY_TIMEOUT` / `TCFLOW_READ_RETRY_TIMEOUT`
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(secs) = env_secs(WRITE_TIMEOUT_ENV)? {
            self.write_retry_timeout_secs = secs;
        }
        if let Some(secs) = env_secs(READ_TIMEOUT_ENV)? {
            self.read_retry_timeout_secs = secs;
        }
        Ok(())
    }

    pub fn write_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(self.write_retry_timeout_secs))
    }

    pub fn read_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(self.read_retry_timeout_secs))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        self.rate_limit.actions.iter().fold(
            RateLimiter::new(self.rate_limit.default_per_second),
            |limiter, (action, per_second)| limiter.with_limit(action.clone(), *per_second),
        )
    }
}

fn env_secs(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

/// tcflow's global configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("tcflow"))
}

/// Locate the provider config file
///
/// Search order:
/// 1. `TCFLOW_CONFIG_PATH`
/// 2. `./tcflow.yaml`
/// 3. `./.tcflow/tcflow.yaml`
/// 4. `~/.config/tcflow/config.yaml`
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let current_dir = std::env::current_dir()?;
    for candidate in [
        current_dir.join("tcflow.yaml"),
        current_dir.join(".tcflow").join("tcflow.yaml"),
    ] {
        if candidate.exists() {
            return Ok(Some(candidate));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("tcflow").join("config.yaml");
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}
