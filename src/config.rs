use std::env;
use std::time::Duration;

use crate::error::{RelayError, RelayResult};

/// TCP port the ETH modules listen on out of the box.
pub const DEFAULT_PORT: u16 = 17494;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// TCP/IP password; `None` when the module has password protection disabled
    pub password: Option<String>,
    /// Applies to connect and to every individual read/write
    pub timeout: Duration,
}

impl RelayConfig {
    pub fn new(host: impl Into<String>, password: impl Into<String>) -> Self {
        let password = password.into();
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            password: (!password.is_empty()).then_some(password),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_env() -> RelayResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> RelayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            host: env_required(&lookup, "RELAY_HOST")?,
            port: env_or_default(&lookup, "RELAY_PORT", DEFAULT_PORT),
            password: env_optional(&lookup, "RELAY_PASSWORD"),
            timeout: Duration::from_secs(env_or_default(
                &lookup,
                "RELAY_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RelayResult<()> {
        if self.host.trim().is_empty() {
            return Err(RelayError::Config("RELAY_HOST must not be empty".into()));
        }
        if self.port == 0 {
            return Err(RelayError::Config("RELAY_PORT must be > 0".into()));
        }
        if self.timeout.is_zero() {
            return Err(RelayError::Config("RELAY_TIMEOUT_SECS must be > 0".into()));
        }
        Ok(())
    }

    /// `host:port` as handed to the socket layer.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_required<F>(lookup: &F, key: &str) -> RelayResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| RelayError::Config(format!("{key} environment variable is required")))
}

fn env_optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.is_empty())
}

fn env_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
