//! # Configuration Management
//!
//! Centralized configuration for the query and master server clients.
//!
//! This module provides structured configuration for the UDP status query,
//! the master server session, the worker runtime and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`UTQUERY_*` variables)
//!
//! ## Timeouts
//! Defaults mirror what deployed servers tolerate: 2s per UDP exchange, 10s
//! to connect and per handshake phase, 15s per listing frame.

use crate::core::codec::DEFAULT_MAX_FRAME_LEN;
use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Standard master server port
pub const DEFAULT_MASTER_PORT: u16 = 28902;

/// Master servers used when no configuration overrides them
pub const DEFAULT_MASTER_HOSTS: [&str; 2] = ["utmaster.openspy.net", "ut2004master.333networks.com"];

/// Largest UDP datagram the query client will accept
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct QueryConfig {
    /// UDP status query configuration
    #[serde(default)]
    pub udp: UdpQueryConfig,

    /// Master server configuration
    #[serde(default)]
    pub master: MasterConfig,

    /// Worker runtime configuration
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl QueryConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(timeout) = std::env::var("UTQUERY_UDP_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.udp.exchange_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(timeout) = std::env::var("UTQUERY_CONNECT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.master.connect_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(timeout) = std::env::var("UTQUERY_HANDSHAKE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.master.handshake_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(servers) = std::env::var("UTQUERY_MASTER_SERVERS") {
            let parsed = servers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(MasterServerAddr::parse)
                .collect::<Result<Vec<_>>>()?;
            if !parsed.is_empty() {
                config.master.servers = parsed;
            }
        }

        if let Ok(level) = std::env::var("UTQUERY_LOG_LEVEL") {
            config.logging.log_level = level
                .parse::<Level>()
                .map_err(|_| ProtocolError::ConfigError(format!("Invalid log level: {level}")))?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.udp.validate());
        errors.extend(self.master.validate());
        errors.extend(self.runtime.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// UDP status query configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UdpQueryConfig {
    /// How long to wait for each of the three replies
    #[serde(with = "duration_serde")]
    pub exchange_timeout: Duration,

    /// Receive buffer size in bytes
    pub recv_buffer_size: usize,
}

impl Default for UdpQueryConfig {
    fn default() -> Self {
        Self {
            exchange_timeout: timeout::UDP_EXCHANGE_TIMEOUT,
            recv_buffer_size: MAX_DATAGRAM_SIZE,
        }
    }
}

impl UdpQueryConfig {
    /// Validate UDP query configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.exchange_timeout.as_millis() < 10 {
            errors.push("UDP exchange timeout too short (minimum: 10ms)".to_string());
        } else if self.exchange_timeout.as_secs() > 60 {
            errors.push("UDP exchange timeout too long (maximum: 60s)".to_string());
        }

        if self.recv_buffer_size < 512 {
            errors.push("UDP receive buffer too small (minimum: 512 bytes)".to_string());
        } else if self.recv_buffer_size > MAX_DATAGRAM_SIZE {
            errors.push(format!(
                "UDP receive buffer too large: {} bytes (maximum: {MAX_DATAGRAM_SIZE})",
                self.recv_buffer_size
            ));
        }

        errors
    }
}

/// Address of one master server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MasterServerAddr {
    pub host: String,
    #[serde(default = "default_master_port")]
    pub port: u16,
}

fn default_master_port() -> u16 {
    DEFAULT_MASTER_PORT
}

impl MasterServerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host` or `host:port`
    pub fn parse(s: &str) -> Result<Self> {
        match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    ProtocolError::ConfigError(format!("Invalid master server port in '{s}'"))
                })?;
                Ok(Self::new(host, port))
            }
            None => Ok(Self::new(s, DEFAULT_MASTER_PORT)),
        }
    }
}

impl fmt::Display for MasterServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Master server session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MasterConfig {
    /// Known master servers, in order of preference
    pub servers: Vec<MasterServerAddr>,

    /// Timeout for resolving and connecting
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Timeout for each handshake reply
    #[serde(with = "duration_serde")]
    pub handshake_timeout: Duration,

    /// Timeout for the result count and each listed server
    #[serde(with = "duration_serde")]
    pub listing_timeout: Duration,

    /// Maximum accepted frame payload in bytes
    pub max_frame_size: usize,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            servers: DEFAULT_MASTER_HOSTS
                .iter()
                .map(|host| MasterServerAddr::new(*host, DEFAULT_MASTER_PORT))
                .collect(),
            connect_timeout: timeout::CONNECT_TIMEOUT,
            handshake_timeout: timeout::HANDSHAKE_TIMEOUT,
            listing_timeout: timeout::LISTING_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl MasterConfig {
    /// Validate master server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.servers.is_empty() {
            errors.push("At least one master server must be configured".to_string());
        }
        for server in &self.servers {
            if server.host.trim().is_empty() {
                errors.push("Master server host cannot be empty".to_string());
            }
            if server.port == 0 {
                errors.push(format!("Invalid master server port: {server}"));
            }
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connection timeout too long (maximum: 300s)".to_string());
        }

        if self.handshake_timeout.as_millis() < 100 {
            errors.push("Handshake timeout too short (minimum: 100ms)".to_string());
        }

        if self.listing_timeout.as_millis() < 100 {
            errors.push("Listing timeout too short (minimum: 100ms)".to_string());
        }

        if self.max_frame_size < 1024 {
            errors.push("Max frame size too small (minimum: 1 KB)".to_string());
        } else if self.max_frame_size > 16 * 1024 * 1024 {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum: 16 MB)",
                self.max_frame_size
            ));
        }

        errors
    }
}

/// Worker runtime configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Worker threads; 0 means one per CPU core
    pub worker_threads: usize,

    /// How long shutdown waits for in-flight queries
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
        }
    }
}

impl RuntimeConfig {
    /// Validate runtime configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.worker_threads > 512 {
            errors.push(format!(
                "Worker thread count very high: {} (maximum: 512)",
                self.worker_threads
            ));
        }

        if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to print event targets
    pub show_targets: bool,

    /// Whether to emit ANSI colors
    pub ansi_colors: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("utquery"),
            log_level: Level::INFO,
            show_targets: false,
            ansi_colors: true,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_ascii_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
