//! # Error Types
//!
//! Custom error types for mav2sport using `thiserror`.

use thiserror::Error;

/// Main error type for mav2sport
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Serial transport errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// No serial device could be opened
    #[error("No serial device found, tried: {0}")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for mav2sport
pub type Result<T> = std::result::Result<T, BridgeError>;
