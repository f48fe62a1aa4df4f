//! # Error Types
//!
//! Custom error types for aprs2influxdb using `thiserror`.

use thiserror::Error;

/// Main error type for aprs2influxdb
#[derive(Debug, Error)]
pub enum BridgeError {
    /// APRS-IS rejected the login (bad banner, wrong callsign, bad passcode)
    #[error("APRS-IS login error: {0}")]
    Login(String),

    /// Feed connection could not be opened or was lost
    #[error("APRS-IS connection error: {0}")]
    Connection(String),

    /// Frame could not be decoded into a packet
    #[error("Decode error: {0}")]
    Decode(String),

    /// InfluxDB rejected a write
    #[error("InfluxDB write error: {0}")]
    Write(String),

    /// HTTP transport errors talking to InfluxDB
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration parse errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration serialization errors
    #[error("Configuration write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Log output could not be set up
    #[error("Logging setup error: {0}")]
    Logging(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for aprs2influxdb
pub type Result<T> = std::result::Result<T, BridgeError>;
