//! Command definitions
//!
//! Represents requests sent to the server.

use std::fmt;

use crate::document::{DocId, Document, Query};

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Insert,
    Find,
    Update,
    Delete,
    Index,
    Get,
    Use,
    ShowDatabases,
    DropDatabase,
    FlushDb,
    Checkpoint,
    Config,
    Stats,
    Expire,
    Publish,
    Help,
    Raw,
}

/// Index kind forwarded with `INDEX`
///
/// The server decides what the integer means; the client only forwards it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexKind {
    /// Hash index (0)
    #[default]
    Hash,
    /// Sorted index (1)
    Sorted,
    /// Any other server-defined kind
    Custom(i32),
}

impl IndexKind {
    pub fn code(self) -> i32 {
        match self {
            IndexKind::Hash => 0,
            IndexKind::Sorted => 1,
            IndexKind::Custom(code) => code,
        }
    }
}

impl From<i32> for IndexKind {
    fn from(code: i32) -> Self {
        match code {
            0 => IndexKind::Hash,
            1 => IndexKind::Sorted,
            other => IndexKind::Custom(other),
        }
    }
}

/// Selector for `GET`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetFilter {
    /// Bare `GET`: every document, as a listing
    All,
    /// `GET <id>`: a single document as a bare object
    Id(DocId),
    /// `GET <start>-<end>`: inclusive id range, as a listing
    Range(DocId, DocId),
    /// Filter text forwarded verbatim
    Raw(String),
}

/// Server setting toggled with `CONFIG`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigParam {
    /// Adaptive indexing
    Adaptive,
    /// Publish/subscribe
    PubSub,
}

impl fmt::Display for ConfigParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigParam::Adaptive => f.write_str("ADAPTIVE"),
            ConfigParam::PubSub => f.write_str("PUBSUB"),
        }
    }
}

/// A request to send
#[derive(Debug, Clone)]
pub enum Command<'a> {
    /// Store a new document
    Insert { document: &'a Document },

    /// Look up documents matching a query
    Find { query: &'a Query },

    /// Overwrite a document
    Update { id: DocId, document: &'a Document },

    /// Remove a document
    Delete { id: DocId },

    /// Ask the server to index a field
    CreateIndex { field: &'a str, kind: IndexKind },

    /// Fetch documents by id
    Get { filter: &'a GetFilter },

    /// Switch the active database
    Use { database: &'a str },

    /// List databases
    ShowDatabases,

    /// Delete a database permanently
    DropDatabase { database: &'a str },

    /// Remove every document in the active database
    FlushDb,

    /// Force the server to persist to disk
    Checkpoint,

    /// Toggle a server setting
    Config { param: ConfigParam, enabled: bool },

    /// Database statistics
    Stats,

    /// Set a time-to-live on a document
    Expire { id: DocId, seconds: u64 },

    /// Send a message to a pub/sub channel
    Publish { channel: &'a str, message: &'a str },

    /// Server command reference
    Help,

    /// Arbitrary command text, sent verbatim
    Raw(&'a str),
}

impl Command<'_> {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Insert { .. } => CommandType::Insert,
            Command::Find { .. } => CommandType::Find,
            Command::Update { .. } => CommandType::Update,
            Command::Delete { .. } => CommandType::Delete,
            Command::CreateIndex { .. } => CommandType::Index,
            Command::Get { .. } => CommandType::Get,
            Command::Use { .. } => CommandType::Use,
            Command::ShowDatabases => CommandType::ShowDatabases,
            Command::DropDatabase { .. } => CommandType::DropDatabase,
            Command::FlushDb => CommandType::FlushDb,
            Command::Checkpoint => CommandType::Checkpoint,
            Command::Config { .. } => CommandType::Config,
            Command::Stats => CommandType::Stats,
            Command::Expire { .. } => CommandType::Expire,
            Command::Publish { .. } => CommandType::Publish,
            Command::Help => CommandType::Help,
            Command::Raw(_) => CommandType::Raw,
        }
    }
}
