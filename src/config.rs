// src/config.rs

//! Manages session configuration: loading, conversion into runtime settings,
//! and validation.

use crate::core::reconnect::{
    Backoff, DEFAULT_MAX_RECONNECT_DELAY, DEFAULT_RECONNECT_DELAY, ReconnectPolicy,
};
use crate::core::transport::{ProtocolKind, ProtocolTypes, ProxyConfig, TransportConfig};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

/// Session loop settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Correlation id sent with logon requests whose logon details leave it
    /// at `0`. Leave at `0` unless another session for the same account runs
    /// from the same address.
    #[serde(default)]
    pub login_id: u32,
    /// The upper bound of one wait for the next batch of transport events.
    #[serde(default = "default_wait_timeout", with = "humantime_serde")]
    pub wait_timeout: Duration,
    /// How long `stop` waits for the transport to confirm the disconnect.
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_id: 0,
            wait_timeout: default_wait_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

fn default_wait_timeout() -> Duration {
    Duration::from_secs(1)
}
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

/// The `[reconnect]` table as written in the file.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct RawReconnectConfig {
    #[serde(default = "default_reconnect_delay", with = "humantime_serde")]
    delay: Duration,
    #[serde(default)]
    backoff: Backoff,
    #[serde(default = "default_max_reconnect_delay", with = "humantime_serde")]
    max_delay: Duration,
    #[serde(default, with = "humantime_serde")]
    jitter: Duration,
    /// `0` retries without limit.
    #[serde(default)]
    max_attempts: u32,
}

impl Default for RawReconnectConfig {
    fn default() -> Self {
        Self {
            delay: default_reconnect_delay(),
            backoff: Backoff::default(),
            max_delay: default_max_reconnect_delay(),
            jitter: Duration::ZERO,
            max_attempts: 0,
        }
    }
}

fn default_reconnect_delay() -> Duration {
    DEFAULT_RECONNECT_DELAY
}
fn default_max_reconnect_delay() -> Duration {
    DEFAULT_MAX_RECONNECT_DELAY
}

impl From<RawReconnectConfig> for ReconnectPolicy {
    fn from(raw: RawReconnectConfig) -> Self {
        Self {
            delay: raw.delay,
            backoff: raw.backoff,
            max_delay: raw.max_delay,
            jitter: raw.jitter,
            max_attempts: (raw.max_attempts > 0).then_some(raw.max_attempts),
        }
    }
}

/// The `[transport]` table as written in the file.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct RawTransportConfig {
    #[serde(default = "default_protocols")]
    protocols: Vec<ProtocolKind>,
    #[serde(default)]
    proxy: Option<ProxyConfig>,
}

impl Default for RawTransportConfig {
    fn default() -> Self {
        Self {
            protocols: default_protocols(),
            proxy: None,
        }
    }
}

fn default_protocols() -> Vec<ProtocolKind> {
    vec![ProtocolKind::Tcp]
}

impl From<RawTransportConfig> for TransportConfig {
    fn from(raw: RawTransportConfig) -> Self {
        Self {
            protocols: raw.protocols.into_iter().collect::<ProtocolTypes>(),
            proxy: raw.proxy,
        }
    }
}

/// The raw configuration structure as deserialized directly from the TOML file.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct RawConfig {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    reconnect: RawReconnectConfig,
    #[serde(default)]
    transport: RawTransportConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// The final, validated configuration used to build a session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Verbosity for the embedding application's subscriber. The crate only
    /// emits `tracing` events and never installs a subscriber itself.
    pub log_level: String,
    pub session: SessionConfig,
    pub reconnect: ReconnectPolicy,
    pub transport: TransportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            session: SessionConfig::default(),
            reconnect: ReconnectPolicy::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl Config {
    /// The configured `log_level` as a filter, for installing a subscriber.
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::INFO)
    }

    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config file '{path}'"))
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw_config: RawConfig =
            toml::from_str(contents).context("Failed to parse TOML configuration")?;

        let config = Config {
            log_level: raw_config.log_level,
            session: raw_config.session,
            reconnect: raw_config.reconnect.into(),
            transport: raw_config.transport.into(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!("log_level '{}' is not a valid level", self.log_level));
        }
        if self.session.wait_timeout.is_zero() {
            return Err(anyhow!("session.wait_timeout cannot be 0"));
        }
        if self.reconnect.delay.is_zero() {
            return Err(anyhow!("reconnect.delay cannot be 0"));
        }
        if self.reconnect.backoff == Backoff::Exponential
            && self.reconnect.max_delay < self.reconnect.delay
        {
            return Err(anyhow!(
                "reconnect.max_delay ({:?}) cannot be shorter than reconnect.delay ({:?})",
                self.reconnect.max_delay,
                self.reconnect.delay
            ));
        }

        self.transport
            .validate()
            .map_err(|e| anyhow!("invalid transport settings: {e}"))?;

        Ok(())
    }
}
