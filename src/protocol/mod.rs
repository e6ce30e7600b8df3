//! Protocol Module
//!
//! Defines the line-oriented text protocol spoken with a FluxDB server.
//!
//! ## Commands
//! - `INSERT <json>`            - store a document
//! - `FIND <json query>`        - ids (and documents) matching a query
//! - `UPDATE <id> <json>`       - overwrite a document
//! - `DELETE <id>`              - remove a document
//! - `INDEX <field> <kind>`     - request an index (0 = hash, 1 = sorted)
//! - `GET [id | start-end]`     - fetch documents by id
//! - administrative commands (`USE`, `FLUSHDB`, `CONFIG ADAPTIVE 1`, ...)
//!
//! ## Replies
//! The first line decides the shape:
//! - `OK ID=<id>`
//! - `OK COUNT=<n>` then `n` lines of `ID <id>` or `ID <id> <json>`
//! - `OK UPDATED`, `OK DELETED`, `OK INDEX_CREATED`
//! - `OK {<json>}`
//! - `ERROR <reason>`

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType, ConfigParam, GetFilter, IndexKind};
pub use response::{ListingEntry, Reply};
pub use codec::{
    decode_reply, encode_command, has_open_body, listing_len, read_delimited_reply,
    read_heuristic_reply, read_until_idle, write_command, CONNECTION_LOST,
};
