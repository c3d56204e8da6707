//! # Error Types
//!
//! Custom error types for MAV Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for MAV Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Serial link errors
    #[error("serial link error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Address parsing errors
    #[error("address error: {0}")]
    Addr(#[from] std::net::AddrParseError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for MAV Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
