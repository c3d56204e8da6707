//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::serial::baud_rate_supported;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub links: LinkConfig,

    #[serde(default)]
    pub rc: RcConfig,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// UDP peer addressing
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// Ground station / radio peer receiving the outbound stream
    #[serde(default = "default_out_addr")]
    pub out_addr: String,

    /// Listen address for the return direction; port 0 disables it
    #[serde(default = "default_in_addr")]
    pub in_addr: String,
}

/// RC channel command configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RcConfig {
    /// 1-based channel to monitor for commands; 0 disables monitoring
    #[serde(default)]
    pub channel: u8,

    /// Delay between committed commands, milliseconds
    #[serde(default = "default_wait_after_command_ms")]
    pub wait_after_command_ms: u64,

    /// How long a channel value must persist to generate a command
    #[serde(default = "default_persist_period_ms")]
    pub persist_period_ms: u64,
}

/// Aggregation policy configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AggregationConfig {
    /// 0 raw forward, 1-49 packet batching, 50-2000 byte batching
    #[serde(default = "default_aggregate")]
    pub aggregate: u32,
}

/// Telemetry injection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Working folder holding the inbox and link health files
    #[serde(default = "default_folder")]
    pub folder: PathBuf,

    /// Inject SoC temperature into the telemetry stream
    #[serde(default)]
    pub temperature: bool,

    /// Monitor the radio log and report dropped packets
    #[serde(default)]
    pub link_health: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Log each packet at debug level
    #[serde(default)]
    pub verbose: bool,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyAMA0".to_string() }
fn default_baud_rate() -> u32 { 115200 }

fn default_out_addr() -> String { "127.0.0.1:14600".to_string() }
fn default_in_addr() -> String { "0.0.0.0:0".to_string() }

fn default_wait_after_command_ms() -> u64 { 2000 }
fn default_persist_period_ms() -> u64 { 2000 }

fn default_aggregate() -> u32 { 1 }

fn default_folder() -> PathBuf { PathBuf::from(".") }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            out_addr: default_out_addr(),
            in_addr: default_in_addr(),
        }
    }
}

impl Default for RcConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            wait_after_command_ms: default_wait_after_command_ms(),
            persist_period_ms: default_persist_period_ms(),
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            aggregate: default_aggregate(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            temperature: false,
            link_health: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolved outbound peer address
    pub fn out_addr(&self) -> Result<SocketAddr> {
        Ok(self.links.out_addr.parse()?)
    }

    /// Resolved inbound listen address
    pub fn in_addr(&self) -> Result<SocketAddr> {
        Ok(self.links.in_addr.parse()?)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("serial port cannot be empty"),
            ));
        }

        if !baud_rate_supported(self.serial.baud_rate) {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom(format!(
                    "unsupported baud rate {}",
                    self.serial.baud_rate
                )),
            ));
        }

        if self.links.out_addr.parse::<SocketAddr>().is_err() {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom(format!("cannot parse out_addr `{}'", self.links.out_addr)),
            ));
        }

        if self.links.in_addr.parse::<SocketAddr>().is_err() {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom(format!("cannot parse in_addr `{}'", self.links.in_addr)),
            ));
        }

        if self.rc.channel > 18 {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("rc channel must be between 0 and 18"),
            ));
        }

        if self.rc.wait_after_command_ms > 600_000 {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("wait_after_command_ms must be at most 600000"),
            ));
        }

        if self.rc.persist_period_ms > 600_000 {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("persist_period_ms must be at most 600000"),
            ));
        }

        if self.telemetry.folder.as_os_str().is_empty() {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("telemetry folder cannot be empty"),
            ));
        }

        Ok(())
    }
}
