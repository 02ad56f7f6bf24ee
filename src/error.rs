//! Error types for relay module access.

use std::time::Duration;

use thiserror::Error;

/// The three failure classes a caller needs to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The device could not be reached, or the link broke mid-exchange.
    Connection,
    /// The device rejected (or demanded) the password.
    Authentication,
    /// The device answered with something unexpected, or the request was invalid for it.
    Protocol,
}

#[derive(Error, Debug)]
pub enum RelayError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// TCP connect failed or the device closed the socket
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timed out after {0:?} waiting for device")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Malformed or negative response from the device
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unknown module id {0}")]
    UnknownModule(u8),

    #[error("Relay {index} is out of range (module has {count} relays)")]
    InvalidRelay { index: u8, count: u8 },

    #[error("Analogue channel {channel} is out of range (module has {count} channels)")]
    InvalidChannel { channel: u8, count: u8 },

    #[error("{model} does not support {feature}")]
    Unsupported {
        model: &'static str,
        feature: &'static str,
    },

    /// Pulse durations are sent in 100ms units, 1..=255
    #[error("Pulse duration {0:?} must be between 100ms and 25.5s")]
    InvalidPulse(Duration),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Connection(_) | RelayError::Timeout(_) | RelayError::Io(_) => {
                ErrorKind::Connection
            }
            RelayError::Authentication(_) => ErrorKind::Authentication,
            RelayError::Config(_)
            | RelayError::Protocol(_)
            | RelayError::UnknownModule(_)
            | RelayError::InvalidRelay { .. }
            | RelayError::InvalidChannel { .. }
            | RelayError::Unsupported { .. }
            | RelayError::InvalidPulse(_) => ErrorKind::Protocol,
        }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
