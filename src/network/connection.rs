//! Connection Manager
//!
//! Owns the client's single socket to the server.

use std::io::{self, BufRead, BufReader, BufWriter, Read};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use crate::config::{ClientConfig, FramingMode};
use crate::error::{FluxError, Result};
use crate::protocol::{
    has_open_body, read_delimited_reply, read_heuristic_reply, read_until_idle, write_command,
    CONNECTION_LOST,
};

/// Result of one round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    /// Reply text from the server, trailing whitespace removed
    Reply(String),

    /// The socket failed during the round trip. The connection was
    /// re-established (if possible) but the command was not resent, so
    /// whether the server applied it is unknown.
    ConnectionLost,
}

impl Exchange {
    /// Reply text, or the `ERROR CONNECTION_LOST` sentinel
    pub fn text(&self) -> &str {
        match self {
            Exchange::Reply(text) => text,
            Exchange::ConnectionLost => CONNECTION_LOST,
        }
    }

    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Exchange::ConnectionLost)
    }

    pub fn into_reply(self) -> Option<String> {
        match self {
            Exchange::Reply(text) => Some(text),
            Exchange::ConnectionLost => None,
        }
    }
}

/// A live socket, split into buffered read and write halves
struct Link {
    /// TCP stream reader (buffered for line framing)
    reader: BufReader<TcpStream>,

    /// TCP stream writer
    writer: BufWriter<TcpStream>,

    /// Peer address for logging
    peer_addr: String,
}

impl Link {
    /// Connect to the configured server, trying each resolved address
    fn open(config: &ClientConfig) -> Result<Self> {
        let mut last_err = None;

        for addr in (config.host.as_str(), config.port).to_socket_addrs()? {
            let attempt = match config.connect_timeout() {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Self::from_stream(stream, config),
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, "host resolved to no addresses")
            })
            .into())
    }

    fn from_stream(stream: TcpStream, config: &ClientConfig) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm: every command is a small single write
        stream.set_nodelay(true)?;
        stream.set_read_timeout(config.read_timeout())?;
        stream.set_write_timeout(config.write_timeout())?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::with_capacity(config.read_buffer_size.max(1), read_stream),
            writer: BufWriter::new(write_stream),
            peer_addr,
        })
    }

    fn round_trip(&mut self, command: &str, config: &ClientConfig) -> io::Result<String> {
        self.discard_stale()?;
        write_command(&mut self.writer, command)?;
        self.read_reply(config)
    }

    fn read_reply(&mut self, config: &ClientConfig) -> io::Result<String> {
        match config.framing {
            FramingMode::Delimited => {
                let mut reply = read_delimited_reply(&mut self.reader)?;
                if has_open_body(&reply) {
                    reply.push_str(&self.read_open_body(config)?);
                }
                Ok(reply)
            }
            FramingMode::Heuristic => read_heuristic_reply(&mut self.reader, config.read_buffer_size),
        }
    }

    /// Read the rest of a reply with no announced length, until the socket
    /// stays quiet for the configured idle window
    fn read_open_body(&mut self, config: &ClientConfig) -> io::Result<String> {
        let Some(idle) = config.body_idle() else {
            return Ok(String::new());
        };

        self.reader.get_ref().set_read_timeout(Some(idle))?;
        let body = read_until_idle(&mut self.reader);
        self.reader.get_ref().set_read_timeout(config.read_timeout())?;
        body
    }

    /// Throw away bytes left over from an earlier reply
    ///
    /// The protocol never pipelines, so anything readable before a command
    /// is written belongs to a reply that was already returned. Leaving it
    /// would shift every later reply by one.
    fn discard_stale(&mut self) -> io::Result<()> {
        let mut discarded = self.reader.buffer().len();
        self.reader.consume(discarded);

        let stream = self.reader.get_mut();
        stream.set_nonblocking(true)?;
        let mut scratch = [0u8; 1024];
        let result = loop {
            match stream.read(&mut scratch) {
                // Peer closed; the round trip itself reports it
                Ok(0) => break Ok(()),
                Ok(n) => discarded += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        stream.set_nonblocking(false)?;

        if discarded > 0 {
            tracing::warn!(
                "Discarded {} stale bytes from {} before sending",
                discarded,
                self.peer_addr
            );
        }
        result
    }

    fn shutdown(&self) {
        if let Err(e) = self.writer.get_ref().shutdown(Shutdown::Both) {
            tracing::trace!("Shutdown of {} failed: {}", self.peer_addr, e);
        }
    }
}

/// Manages the connection to one FluxDB server
///
/// Holds at most one socket. A transport failure drops the socket and
/// triggers exactly one reconnect attempt; the failed command is reported
/// as [`Exchange::ConnectionLost`] and never resent.
///
/// Not safe for concurrent use: one round trip must complete before the
/// next begins, which `&mut self` enforces.
pub struct Connection {
    config: ClientConfig,
    link: Option<Link>,
}

impl Connection {
    /// Create an unconnected manager
    pub fn new(config: ClientConfig) -> Self {
        Self { config, link: None }
    }

    /// Create a manager and attempt the first connection
    ///
    /// A refused connection is not an error here; the first command will
    /// report [`FluxError::NotConnected`].
    pub fn open(config: ClientConfig) -> Self {
        let mut connection = Self::new(config);
        connection.connect();
        connection
    }

    /// (Re)establish the socket, replacing any existing one
    ///
    /// Returns whether a socket is now held. Failures are logged, not raised.
    pub fn connect(&mut self) -> bool {
        self.close();

        let addr = self.config.addr();
        match Link::open(&self.config) {
            Ok(link) => {
                tracing::info!("Connected to FluxDB at {}", link.peer_addr);
                self.link = Some(link);
                true
            }
            Err(e) => {
                tracing::warn!("Could not connect to {}: {}. Is the server running?", addr, e);
                false
            }
        }
    }

    /// Send one command line and read its reply
    ///
    /// Fails only when no socket is held. Socket errors during the round
    /// trip are absorbed into [`Exchange::ConnectionLost`].
    pub fn send_and_receive(&mut self, command: &str) -> Result<Exchange> {
        let result = match self.link.as_mut() {
            Some(link) => link.round_trip(command, &self.config),
            None => {
                return Err(FluxError::NotConnected {
                    addr: self.config.addr(),
                })
            }
        };

        match result {
            Ok(text) => {
                tracing::trace!("-> {:?} <- {:?}", command, text);
                Ok(Exchange::Reply(text.trim_end().to_string()))
            }
            Err(e) => {
                tracing::warn!("Socket error on {:?}: {}", command, e);
                self.reconnect_after_failure();
                Ok(Exchange::ConnectionLost)
            }
        }
    }

    fn reconnect_after_failure(&mut self) {
        if let Some(link) = self.link.take() {
            tracing::debug!("Dropping connection to {}", link.peer_addr);
            link.shutdown();
        }
        if !self.connect() {
            tracing::debug!("Reconnect to {} failed; connection left unset", self.config.addr());
        }
    }

    /// Release the socket, if any
    pub fn close(&mut self) {
        if let Some(link) = self.link.take() {
            tracing::debug!("Closing connection to {}", link.peer_addr);
            link.shutdown();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Get the peer address string of the live socket
    pub fn peer_addr(&self) -> Option<&str> {
        self.link.as_ref().map(|link| link.peer_addr.as_str())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("addr", &self.config.addr())
            .field("peer_addr", &self.peer_addr())
            .finish()
    }
}
