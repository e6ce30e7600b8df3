//! Client Module
//!
//! Typed operations over a [`Connection`].
//!
//! ## Flow (per call)
//! ```text
//! Idle → encode → Sending → Awaiting ─┬─→ Decoding ─────→ Success / Failed
//!                                     └─→ Reconnecting ──→ TransportFailure
//! ```
//!
//! `Err` is returned only when no socket is held (or a command cannot be
//! written as a single line). Everything the server says, and every
//! dropped connection, is an [`Outcome`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ClientConfig;
use crate::document::{DocId, Document, Query};
use crate::error::Result;
use crate::network::{Connection, Exchange};
use crate::outcome::Outcome;
use crate::protocol::{
    decode_reply, encode_command, Command, ConfigParam, GetFilter, IndexKind, ListingEntry, Reply,
};

/// Extraction of one operation's value from a decoded reply; gives the
/// reply back when it has the wrong shape
type Extracted<T> = std::result::Result<T, Reply>;

/// Client for one FluxDB server
///
/// ```no_run
/// use fluxdb::{Client, ClientConfig, Query};
/// use serde_json::json;
///
/// let mut db = Client::connect(ClientConfig::default());
/// let user = fluxdb::document_from(json!({"username": "ada", "level": 10})).unwrap();
///
/// if let Some(id) = db.insert(&user)?.success() {
///     let ids = db.find(&Query::new().eq("username", "ada"))?.unwrap_or_default();
///     assert!(ids.contains(&id));
/// }
/// # Ok::<(), fluxdb::FluxError>(())
/// ```
#[derive(Debug)]
pub struct Client {
    connection: Connection,
}

impl Client {
    /// Create a client and attempt to connect
    ///
    /// An unreachable server is logged, not raised; commands then fail with
    /// [`FluxError::NotConnected`](crate::FluxError::NotConnected) until
    /// [`reconnect`](Self::reconnect) succeeds.
    pub fn connect(config: ClientConfig) -> Self {
        Self {
            connection: Connection::open(config),
        }
    }

    /// Wrap an existing connection manager
    pub fn with_connection(connection: Connection) -> Self {
        Self { connection }
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Insert a document, returning its server-assigned id
    pub fn insert(&mut self, document: &Document) -> Result<Outcome<DocId>> {
        self.request(Command::Insert { document }, |reply| match reply {
            Reply::Inserted(id) => Ok(id),
            other => Err(other),
        })
    }

    /// Ids of the documents matching `query`, in server order
    pub fn find(&mut self, query: &Query) -> Result<Outcome<Vec<DocId>>> {
        self.request(Command::Find { query }, |reply| match reply {
            Reply::Listing(entries) => Ok(entries.into_iter().map(|e| e.id).collect()),
            other => Err(other),
        })
    }

    /// Documents matching `query`, each with an injected `_id` field
    pub fn find_documents(&mut self, query: &Query) -> Result<Outcome<Vec<(DocId, Document)>>> {
        self.request(Command::Find { query }, listing_documents)
    }

    /// Overwrite the document stored under `id`
    pub fn update(&mut self, id: DocId, document: &Document) -> Result<Outcome<()>> {
        self.request(Command::Update { id, document }, |reply| match reply {
            Reply::Updated => Ok(()),
            other => Err(other),
        })
    }

    pub fn delete(&mut self, id: DocId) -> Result<Outcome<()>> {
        self.request(Command::Delete { id }, |reply| match reply {
            Reply::Deleted => Ok(()),
            other => Err(other),
        })
    }

    /// Ask the server to index `field`
    ///
    /// Whether the server uses the index is invisible to the client; query
    /// results are the same either way.
    pub fn create_index(&mut self, field: &str, kind: IndexKind) -> Result<Outcome<()>> {
        self.request(Command::CreateIndex { field, kind }, |reply| match reply {
            Reply::IndexCreated => Ok(()),
            other => Err(other),
        })
    }

    /// `GET` with any filter; succeeds for every non-error reply
    pub fn get(&mut self, filter: &GetFilter) -> Result<Outcome<Reply>> {
        self.request(Command::Get { filter }, |reply| {
            if reply.is_ok() {
                Ok(reply)
            } else {
                Err(reply)
            }
        })
    }

    /// Every document in the active database
    pub fn get_all(&mut self) -> Result<Outcome<Vec<(DocId, Document)>>> {
        self.request(Command::Get { filter: &GetFilter::All }, listing_documents)
    }

    pub fn get_by_id(&mut self, id: DocId) -> Result<Outcome<Document>> {
        self.request(Command::Get { filter: &GetFilter::Id(id) }, |reply| match reply {
            Reply::Object(document) => Ok(document),
            other => Err(other),
        })
    }

    /// Documents with ids in `start..=end`
    pub fn get_range(&mut self, start: DocId, end: DocId) -> Result<Outcome<Vec<(DocId, Document)>>> {
        self.request(
            Command::Get {
                filter: &GetFilter::Range(start, end),
            },
            listing_documents,
        )
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Switch the active database (created by the server if missing)
    pub fn use_database(&mut self, database: &str) -> Result<Outcome<()>> {
        self.request(Command::Use { database }, |reply| ack(reply, "SWITCHED_TO").map(drop))
    }

    pub fn show_databases(&mut self) -> Result<Outcome<Vec<String>>> {
        self.request(Command::ShowDatabases, |reply| match reply {
            Reply::Ack(text) => match serde_json::from_str::<Vec<String>>(&text) {
                Ok(databases) => Ok(databases),
                Err(_) => Err(Reply::Ack(text)),
            },
            other => Err(other),
        })
    }

    pub fn drop_database(&mut self, database: &str) -> Result<Outcome<()>> {
        self.request(Command::DropDatabase { database }, |reply| {
            ack(reply, "DROPPED").map(drop)
        })
    }

    /// Remove every document in the active database
    pub fn flush_db(&mut self) -> Result<Outcome<()>> {
        self.request(Command::FlushDb, |reply| ack(reply, "FLUSHED").map(drop))
    }

    pub fn checkpoint(&mut self) -> Result<Outcome<()>> {
        self.request(Command::Checkpoint, |reply| {
            ack(reply, "CHECKPOINT_COMPLETE").map(drop)
        })
    }

    /// Toggle the server's adaptive indexing
    pub fn set_adaptive(&mut self, enabled: bool) -> Result<Outcome<()>> {
        self.configure(ConfigParam::Adaptive, enabled)
    }

    pub fn set_pubsub(&mut self, enabled: bool) -> Result<Outcome<()>> {
        self.configure(ConfigParam::PubSub, enabled)
    }

    fn configure(&mut self, param: ConfigParam, enabled: bool) -> Result<Outcome<()>> {
        self.request(Command::Config { param, enabled }, |reply| {
            ack(reply, "CONFIG_UPDATED").map(drop)
        })
    }

    /// Database statistics as reported by the server
    pub fn stats(&mut self) -> Result<Outcome<Document>> {
        self.request(Command::Stats, |reply| match reply {
            Reply::Object(stats) => Ok(stats),
            other => Err(other),
        })
    }

    /// Expire the document `id` after `seconds`
    pub fn expire(&mut self, id: DocId, seconds: u64) -> Result<Outcome<()>> {
        self.request(Command::Expire { id, seconds }, |reply| ack(reply, "TTL_SET").map(drop))
    }

    /// Publish to a channel, returning the number of receivers
    pub fn publish(&mut self, channel: &str, message: &str) -> Result<Outcome<usize>> {
        self.request(Command::Publish { channel, message }, |reply| {
            let text = ack(reply, "RECEIVERS=")?;
            text["RECEIVERS=".len()..]
                .trim()
                .parse::<usize>()
                .map_err(|_| Reply::Ack(text.clone()))
        })
    }

    /// Server command reference
    pub fn help(&mut self) -> Result<Outcome<String>> {
        self.request(Command::Help, |reply| match reply {
            Reply::Ack(text) => Ok(text),
            other => Err(other),
        })
    }

    /// Send arbitrary command text verbatim (e.g. `FLUSHDB`,
    /// `CONFIG ADAPTIVE 1`)
    pub fn raw_command(&mut self, text: &str) -> Result<Exchange> {
        self.execute(Command::Raw(text))
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Drop the current socket (if any) and connect again
    pub fn reconnect(&mut self) -> bool {
        self.connection.connect()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn close(&mut self) {
        self.connection.close();
    }

    pub fn config(&self) -> &ClientConfig {
        self.connection.config()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn execute(&mut self, command: Command<'_>) -> Result<Exchange> {
        let text = encode_command(&command)?;
        self.connection.send_and_receive(&text)
    }

    fn request<T>(
        &mut self,
        command: Command<'_>,
        extract: impl FnOnce(Reply) -> Extracted<T>,
    ) -> Result<Outcome<T>> {
        let command_type = command.command_type();

        let text = match self.execute(command)? {
            Exchange::Reply(text) => text,
            Exchange::ConnectionLost => {
                tracing::debug!("{:?} lost with the connection", command_type);
                return Ok(Outcome::TransportFailure);
            }
        };

        match extract(decode_reply(&text)) {
            Ok(value) => Ok(Outcome::Success(value)),
            Err(reply) => {
                let reason = reply.describe();
                tracing::debug!("{:?} failed: {}", command_type, reason);
                Ok(Outcome::Failed(reason))
            }
        }
    }
}

/// Text of an `OK <prefix>...` acknowledgement
fn ack(reply: Reply, prefix: &str) -> Extracted<String> {
    match reply {
        Reply::Ack(text) if text.starts_with(prefix) => Ok(text),
        other => Err(other),
    }
}

/// `(id, document)` pairs of a listing; entries without a document are
/// dropped
fn listing_documents(reply: Reply) -> Extracted<Vec<(DocId, Document)>> {
    match reply {
        Reply::Listing(entries) => Ok(entries
            .into_iter()
            .filter_map(|ListingEntry { id, document }| document.map(|doc| (id, doc)))
            .collect()),
        other => Err(other),
    }
}

// =============================================================================
// Shared Client
// =============================================================================

/// A client that several threads can share
///
/// Each call holds the lock for its whole round trip, so commands from
/// different threads never interleave on the socket.
#[derive(Debug, Clone)]
pub struct SharedClient {
    inner: Arc<Mutex<Client>>,
}

impl SharedClient {
    pub fn new(client: Client) -> Self {
        Self {
            inner: Arc::new(Mutex::new(client)),
        }
    }

    /// Run several operations without another thread's commands in between
    pub fn with<R>(&self, f: impl FnOnce(&mut Client) -> R) -> R {
        let mut client = self.inner.lock();
        f(&mut client)
    }

    pub fn insert(&self, document: &Document) -> Result<Outcome<DocId>> {
        self.with(|client| client.insert(document))
    }

    pub fn find(&self, query: &Query) -> Result<Outcome<Vec<DocId>>> {
        self.with(|client| client.find(query))
    }

    pub fn update(&self, id: DocId, document: &Document) -> Result<Outcome<()>> {
        self.with(|client| client.update(id, document))
    }

    pub fn delete(&self, id: DocId) -> Result<Outcome<()>> {
        self.with(|client| client.delete(id))
    }
}
