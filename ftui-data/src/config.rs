//! Materialised configuration: the servers to monitor plus refresh and display tuning.
//!
//! Loaded from TOML, then adjusted by environment overrides.

use crate::{category::Cadence, source::rest::Credentials};
use serde::Deserialize;
use smol_str::SmolStr;
use std::{collections::HashSet, path::Path, str::FromStr, time::Duration};
use thiserror::Error;
use url::Url;

pub const ENV_POOL_SIZE: &str = "FTUI_POOL_SIZE";
pub const ENV_TIMEOUT_SECS: &str = "FTUI_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub servers: Vec<ServerConfig>,
    pub refresh: RefreshConfig,
    pub display: DisplayConfig,
}

/// One `[[servers]]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub name: Option<SmolStr>,
    pub host: String,
    pub port: u16,
    pub username: SmolStr,
    pub password: SmolStr,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Maximum concurrent upstream fetches across all sources.
    pub pool_size: usize,
    pub fast_secs: u64,
    pub medium_secs: u64,
    pub slow_secs: u64,
    pub timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            fast_secs: Cadence::Fast.default_period().as_secs(),
            medium_secs: Cadence::Medium.default_period().as_secs(),
            slow_secs: Cadence::Slow.default_period().as_secs(),
            timeout_secs: 10,
        }
    }
}

impl RefreshConfig {
    pub fn period(&self, cadence: Cadence) -> Duration {
        let secs = match cadence {
            Cadence::Fast => self.fast_secs,
            Cadence::Medium => self.medium_secs,
            Cadence::Slow => self.slow_secs,
        };
        Duration::from_secs(secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Number of bars kept in a chart window.
    pub chart_bars: u32,
    pub log_limit: u32,
    pub show_sysinfo: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            chart_bars: 200,
            log_limit: 100,
            show_sysinfo: true,
        }
    }
}

impl Config {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Append a server definition.
    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.servers.push(server);
        self
    }

    /// Set the fetch pool size.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.refresh.pool_size = pool_size;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.refresh.timeout_secs = timeout_secs;
        self
    }

    /// Apply `FTUI_POOL_SIZE` / `FTUI_TIMEOUT_SECS` from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_POOL_SIZE) {
            self.refresh.pool_size = parse_override(ENV_POOL_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            self.refresh.timeout_secs = parse_override(ENV_TIMEOUT_SECS, &value)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::Invalid("no servers configured".to_string()));
        }
        if self.refresh.pool_size == 0 {
            return Err(ConfigError::Invalid("pool_size must be at least 1".to_string()));
        }
        if self.refresh.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".to_string()));
        }
        if Cadence::ALL
            .iter()
            .any(|cadence| self.refresh.period(*cadence).is_zero())
        {
            return Err(ConfigError::Invalid("refresh periods must be non-zero".to_string()));
        }

        let mut names = HashSet::new();
        for server in &self.servers {
            if server.port == 0 {
                return Err(ConfigError::Invalid(format!(
                    "server {} has port 0",
                    server.address()
                )));
            }
            if let Some(name) = &server.name {
                if !names.insert(name.clone()) {
                    return Err(ConfigError::Invalid(format!("duplicate server name {name}")));
                }
            }
        }
        Ok(())
    }
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key}={value:?} is not a valid number")))
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL of the bot; hosts without a scheme default to `http`.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        let host = self.host.trim_end_matches('/');
        let raw = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}:{}/", self.port)
        } else {
            format!("http://{host}:{}/", self.port)
        };
        Url::parse(&raw)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl FromStr for ServerConfig {
    type Err = ConfigError;

    /// Parse `NAME:HOST:PORT:USER:PASS`; an empty `NAME` defers to the bot's own name.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Invalid(format!("expected NAME:HOST:PORT:USER:PASS, got {input:?}"));

        let mut parts = input.splitn(5, ':');
        let name = parts.next().ok_or_else(invalid)?;
        let host = parts.next().filter(|host| !host.is_empty()).ok_or_else(invalid)?;
        let port = parts
            .next()
            .and_then(|port| port.parse::<u16>().ok())
            .ok_or_else(invalid)?;
        let username = parts.next().ok_or_else(invalid)?;
        let password = parts.next().ok_or_else(invalid)?;

        Ok(Self {
            name: (!name.is_empty()).then(|| SmolStr::new(name)),
            host: host.to_string(),
            port,
            username: SmolStr::new(username),
            password: SmolStr::new(password),
            enabled: true,
        })
    }
}
