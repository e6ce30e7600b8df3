//! Network Module
//!
//! TCP connection handling.
//!
//! ## Architecture
//! - One socket per client, opened on construction
//! - Blocking write, framed blocking read
//! - One reconnect attempt after a socket error, no resend

mod connection;

pub use connection::{Connection, Exchange};
