//! # FluxDB Client
//!
//! A blocking TCP client for the FluxDB document store:
//! - Typed document operations (insert / find / update / delete / index / get)
//! - Line-oriented text protocol with newline-delimited reply framing
//! - Lenient reply decoding: server refusals become values, never panics
//! - One reconnect attempt after a dropped connection, reported explicitly
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Client                               │
//! │              (typed operations → Outcome<T>)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Encoder   │          │   Decoder   │
//!   │  (Command)  │          │   (Reply)   │
//!   └──────┬──────┘          └──────▲──────┘
//!          │                        │
//!          ▼                        │
//! ┌─────────────────────────────────┴───────────────────────────┐
//! │                   Connection Manager                         │
//! │         (one socket, framed reads, reconnect once)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ TCP
//!                       ▼
//!                 FluxDB server
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod document;
pub mod outcome;
pub mod protocol;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FluxError, Result};
pub use config::{ClientConfig, FramingMode};
pub use document::{document_from, DocId, Document, Query};
pub use outcome::Outcome;
pub use protocol::{GetFilter, IndexKind, Reply};
pub use network::{Connection, Exchange};
pub use client::{Client, SharedClient};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of the FluxDB client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
