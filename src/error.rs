//! Error types for the FluxDB client
//!
//! Only conditions that the caller must act on become errors. Server-side
//! refusals and dropped connections are reported through
//! [`Outcome`](crate::Outcome) instead.

use thiserror::Error;

/// Result type alias using FluxError
pub type Result<T> = std::result::Result<T, FluxError>;

/// Unified error type for FluxDB client operations
#[derive(Debug, Error)]
pub enum FluxError {
    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    /// A command was issued while no socket is held
    #[error("Not connected to FluxDB at {addr}")]
    NotConnected { addr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for FluxError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
