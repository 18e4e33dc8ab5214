//! Relay server configuration.
//!
//! Sources, lowest precedence first:
//! - built-in defaults
//! - an optional TOML file (`--config` / `IMRELAY_CONFIG`)
//! - `IMRELAY_*` environment variables (`IMRELAY_BIND_ADDR`, `IMRELAY_OUTBOUND_BUFFER`, ...)
//! - command line flags
//!
//! # Example
//!
//! ```toml
//! bind_addr = "127.0.0.1:9000"
//! endpoint_path = "/imserver"
//! outbound_buffer = 512
//! welcome_message = ""          # empty disables the greeting
//! offline_notice = "{userId} is offline"
//! log_format = "json"
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ::config::{Config, Environment, File};
use imrelay_core::{RouterConfig, DEFAULT_OFFLINE_NOTICE, DEFAULT_WELCOME_MESSAGE};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, multi-line
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Relay server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the HTTP/WebSocket listener binds to
    pub bind_addr: String,
    /// Path prefix of the WebSocket endpoint, the user id follows it
    pub endpoint_path: String,
    /// Capacity of each connection's outbound queue
    pub outbound_buffer: usize,
    /// Greeting sent after registration, blank disables it
    pub welcome_message: String,
    /// Offline notice template, `{userId}` is replaced with the recipient
    pub offline_notice: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            endpoint_path: "/imserver".to_string(),
            outbound_buffer: 256,
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            offline_notice: DEFAULT_OFFLINE_NOTICE.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: RelayConfig = builder
            .add_source(Environment::with_prefix("IMRELAY").try_parsing(true))
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        if !self.endpoint_path.starts_with('/') {
            bail!("endpoint_path must start with '/': {}", self.endpoint_path);
        }
        if self.outbound_buffer == 0 {
            bail!("outbound_buffer must be at least 1");
        }
        Ok(())
    }

    /// Parsed listener address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.bind_addr))
    }

    /// Route pattern of the WebSocket endpoint.
    pub fn endpoint_route(&self) -> String {
        format!("{}/:user_id", self.endpoint_path.trim_end_matches('/'))
    }

    /// Greeting to send, if enabled.
    pub fn welcome_message(&self) -> Option<String> {
        Some(self.welcome_message.clone()).filter(|m| !m.trim().is_empty())
    }

    /// Router settings derived from this configuration.
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig::new().with_offline_notice(self.offline_notice.clone())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Bind address: {}", self.bind_addr);
        info!("WebSocket endpoint: {}", self.endpoint_route());
        info!("Outbound buffer: {}", self.outbound_buffer);
        match self.welcome_message() {
            Some(message) => info!("Welcome message: {}", message),
            None => info!("Welcome message: disabled"),
        }
        info!("Offline notice: {}", self.offline_notice);
        info!("Log format: {}", self.log_format);
    }
}
