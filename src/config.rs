//! Configuration for the FluxDB client
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{FluxError, Result};

/// Main configuration for a FluxDB client instance
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -------------------------------------------------------------------------
    // Server Address
    // -------------------------------------------------------------------------
    /// Server host name or IP address
    pub host: String,

    /// Server TCP port
    pub port: u16,

    // -------------------------------------------------------------------------
    // Timeouts
    // -------------------------------------------------------------------------
    /// Connect timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Socket read timeout (milliseconds, 0 = block forever)
    pub read_timeout_ms: u64,

    /// Socket write timeout (milliseconds, 0 = block forever)
    pub write_timeout_ms: u64,

    /// How long a reply body with no announced length may go quiet before
    /// it is complete (milliseconds, 0 = take only what is already buffered)
    pub body_idle_ms: u64,

    // -------------------------------------------------------------------------
    // Framing
    // -------------------------------------------------------------------------
    /// Size of a single read in heuristic framing, and the capacity of
    /// the buffered reader in delimited framing
    pub read_buffer_size: usize,

    /// How the connection decides a reply is complete
    pub framing: FramingMode,
}

/// Reply framing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingMode {
    /// Newline-terminated header line, followed by exactly `n` lines when
    /// the header is `OK COUNT=<n>`
    #[default]
    Delimited,

    /// Accumulate chunks until EOF, a read timeout after data, or a short
    /// chunk. Only for servers that do not terminate replies with newlines.
    Heuristic,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            connect_timeout_ms: 5000,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
            body_idle_ms: 100,
            read_buffer_size: 4096,
            framing: FramingMode::Delimited,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// `host:port` as used for connecting and in log lines
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms)
    }

    pub(crate) fn read_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms)
    }

    pub(crate) fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }

    pub(crate) fn body_idle(&self) -> Option<Duration> {
        millis(self.body_idle_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the idle window that ends an open-ended reply body (in milliseconds)
    pub fn body_idle_ms(mut self, ms: u64) -> Self {
        self.config.body_idle_ms = ms;
        self
    }

    /// Set the read buffer size (in bytes)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set the reply framing strategy
    pub fn framing(mut self, framing: FramingMode) -> Self {
        self.config.framing = framing;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }

    /// Build and reject settings the connection cannot work with
    pub fn try_build(self) -> Result<ClientConfig> {
        let config = self.config;
        if config.host.trim().is_empty() {
            return Err(FluxError::Config("host must not be empty".to_string()));
        }
        if config.port == 0 {
            return Err(FluxError::Config("port must not be 0".to_string()));
        }
        if config.read_buffer_size == 0 {
            return Err(FluxError::Config(
                "read_buffer_size must be greater than 0".to_string(),
            ));
        }
        Ok(config)
    }
}
