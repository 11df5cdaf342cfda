//! # Time Sender Configuration
//!
//! All settings live in a single TOML file. Every field has a default, so an empty
//! file (or no file at all) gives a working setup.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud = 115200
//! timeout_ms = 1000
//!
//! [clock]
//! utc_offset_hours = 2
//! overflow = "reject"
//!
//! [sender]
//! poll_interval_ms = 1
//!
//! [cancel]
//! key = "esc"
//! ```
//!
//! ## Example: Rust Usage
//!
//! ```rust
//! use timesync_rs::config::Config;
//! let config: Config = toml::from_str("[clock]\nutc_offset_hours = -5").unwrap();
//! assert_eq!(config.clock.utc_offset_hours, -5);
//! assert_eq!(config.serial.baud, 115200);
//! assert!(config.validate().is_ok());
//! ```

use crate::codec::OverflowPolicy;
use crate::keyboard::CancelKey;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub sender: SenderConfig,
    #[serde(default)]
    pub cancel: CancelConfig,
}

/// Serial link to the downstream device.
#[derive(Debug, Clone, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Upper bound for a single write, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud: default_baud(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClockConfig {
    /// Fixed correction added to every timestamp before it is sent.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset_hours(),
            overflow: OverflowPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl SenderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelConfig {
    #[serde(default)]
    pub key: CancelKey,
}

pub const MIN_UTC_OFFSET_HOURS: i32 = -12;
pub const MAX_UTC_OFFSET_HOURS: i32 = 14;

impl Config {
    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.port.trim().is_empty() {
            return Err(ConfigError::Invalid("serial.port must not be empty".into()));
        }
        if self.serial.baud == 0 {
            return Err(ConfigError::Invalid("serial.baud must be greater than zero".into()));
        }
        if self.serial.timeout_ms == 0 {
            return Err(ConfigError::Invalid("serial.timeout_ms must be greater than zero".into()));
        }
        if !(MIN_UTC_OFFSET_HOURS..=MAX_UTC_OFFSET_HOURS).contains(&self.clock.utc_offset_hours) {
            return Err(ConfigError::Invalid(format!(
                "clock.utc_offset_hours must be within {}..={}, got {}",
                MIN_UTC_OFFSET_HOURS, MAX_UTC_OFFSET_HOURS, self.clock.utc_offset_hours
            )));
        }
        if self.sender.poll_interval_ms == 0 || self.sender.poll_interval_ms > 1000 {
            return Err(ConfigError::Invalid(format!(
                "sender.poll_interval_ms must be within 1..=1000, got {}",
                self.sender.poll_interval_ms
            )));
        }
        Ok(())
    }
}

fn default_port() -> String {
    if cfg!(windows) { "COM10".to_string() } else { "/dev/ttyUSB0".to_string() }
}
fn default_baud() -> u32 { 115200 }
fn default_timeout_ms() -> u64 { 1000 }
fn default_utc_offset_hours() -> i32 { 2 }
fn default_poll_interval_ms() -> u64 { 1 }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(config) => {
                config.validate()?;
                Ok(config)
            }
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}

/// Like [`load_config`], but a missing file yields the defaults unless the
/// path was given explicitly.
pub fn load_or_default(path: &str, explicit: bool) -> Result<Config, ConfigError> {
    if !explicit && !Path::new(path).exists() {
        tracing::info!("No config file at '{}', using defaults", path);
        return Ok(Config::default());
    }
    load_config(path)
}
