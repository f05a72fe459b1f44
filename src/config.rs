//! # Configuration Management
//!
//! Centralized configuration for the protocol client.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`BLOCKWIRE_*` variables)
//!
//! The protocol version is fixed; there is no version negotiation.

use crate::error::{constants, ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Protocol version announced in the handshake
pub const PROTOCOL_VERSION: i32 = 47;

/// Default server port
pub const DEFAULT_PORT: u16 = 25565;

/// Largest frame the protocol can express with a 3-byte length prefix (2 MiB - 1)
pub const MAX_FRAME_SIZE: usize = (1 << 21) - 1;

/// Period of the movement sync loop
pub const SYNC_INTERVAL: Duration = Duration::from_millis(16);

/// Delay before a deferred respawn request fires
pub const RESPAWN_DELAY: Duration = Duration::from_millis(1250);

/// Default timeout for establishing the TCP connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of pre-allocated scratch buffers
pub const DEFAULT_SCRATCH_POOL_SIZE: usize = 16;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Client connection settings
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
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

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("BLOCKWIRE_HOST") {
            config.client.host = host;
        }

        if let Ok(port) = std::env::var("BLOCKWIRE_PORT") {
            config.client.port = port
                .parse::<u16>()
                .map_err(|e| ProtocolError::ConfigError(format!("Invalid BLOCKWIRE_PORT: {e}")))?;
        }

        if let Ok(username) = std::env::var("BLOCKWIRE_USERNAME") {
            config.client.username = username;
        }

        if let Ok(timeout) = std::env::var("BLOCKWIRE_CONNECT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.connect_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(level) = std::env::var("BLOCKWIRE_LOG_LEVEL") {
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

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
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

/// Client connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host name, also sent in the handshake
    pub host: String,

    /// Server port
    pub port: u16,

    /// Requested username (the server's reply is authoritative)
    pub username: String,

    /// Timeout for the TCP connect
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Period of the movement sync loop
    #[serde(with = "duration_serde")]
    pub sync_interval: Duration,

    /// Delay before a deferred respawn request fires
    #[serde(with = "duration_serde")]
    pub respawn_delay: Duration,

    /// Largest accepted inbound frame
    pub max_frame_size: usize,

    /// Number of pre-allocated scratch buffers for packet serialization
    pub scratch_pool_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: DEFAULT_PORT,
            username: String::from("Player"),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            sync_interval: SYNC_INTERVAL,
            respawn_delay: RESPAWN_DELAY,
            max_frame_size: MAX_FRAME_SIZE,
            scratch_pool_size: DEFAULT_SCRATCH_POOL_SIZE,
        }
    }
}

impl ClientConfig {
    /// `host:port` string for the TCP connect
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.is_empty() {
            errors.push("Client host cannot be empty".to_string());
        }

        if self.port == 0 {
            errors.push("Client port must be greater than 0".to_string());
        }

        // The server enforces a 16 character limit on login names
        if self.username.is_empty() {
            errors.push(constants::ERR_EMPTY_USERNAME.to_string());
        } else if self.username.chars().count() > 16 {
            errors.push(format!(
                "Username too long: '{}' (maximum: 16 characters)",
                self.username
            ));
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connect timeout too long (maximum: 300s)".to_string());
        }

        if self.sync_interval.is_zero() {
            errors.push("Sync interval must be greater than 0".to_string());
        } else if self.sync_interval.as_secs() >= 1 {
            errors.push("Sync interval too long (maximum: 999ms)".to_string());
        }

        if self.respawn_delay.as_secs() > 60 {
            errors.push("Respawn delay too long (maximum: 60s)".to_string());
        }

        if self.max_frame_size == 0 {
            errors.push("Max frame size must be greater than 0".to_string());
        } else if self.max_frame_size > MAX_FRAME_SIZE {
            errors.push(format!(
                "Max frame size too large: {} (protocol maximum: {MAX_FRAME_SIZE})",
                self.max_frame_size
            ));
        }

        if self.scratch_pool_size > 1024 {
            errors.push(format!(
                "Scratch pool size very high: {} (maximum: 1024)",
                self.scratch_pool_size
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Colored output
    pub ansi: bool,

    /// Include the event target (module path)
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            ansi: true,
            with_target: false,
        }
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
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
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
