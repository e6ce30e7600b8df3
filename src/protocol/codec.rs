//! Protocol codec
//!
//! Encoding of commands, framing of replies, and decoding of replies.
//!
//! ## Wire Format
//!
//! ### Request
//! ```text
//! <VERB> [args...]\n
//! ```
//! One command per line. JSON arguments are compact single-line
//! `serde_json` output.
//!
//! ### Reply
//! ```text
//! OK ID=<id>\n
//! OK COUNT=<n>\n ID <id> [<json>]\n  (n times)
//! OK UPDATED\n | OK DELETED\n | OK INDEX_CREATED\n
//! OK {<json>}\n
//! ERROR <reason>\n
//! ```

use std::io::{self, BufRead, BufReader, Read, Write};

use bytes::BytesMut;

use super::{Command, GetFilter, ListingEntry, Reply};
use crate::document::{DocId, Document, ID_FIELD};
use crate::error::{FluxError, Result};

/// Text the connection substitutes for a reply when the transport failed
pub const CONNECTION_LOST: &str = "ERROR CONNECTION_LOST";

const PREFIX_INSERTED: &str = "OK ID=";
const PREFIX_COUNT: &str = "OK COUNT=";
const PREFIX_UPDATED: &str = "OK UPDATED";
const PREFIX_DELETED: &str = "OK DELETED";
const MARKER_INDEX_CREATED: &str = "OK INDEX_CREATED";
const PREFIX_OBJECT: &str = "OK {";
const PREFIX_ERROR: &str = "ERROR";
const PREFIX_OK: &str = "OK";
const PREFIX_ID_LINE: &str = "ID ";

// =============================================================================
// Command Encoding
// =============================================================================

/// Encode a command to its wire text (without the trailing newline)
///
/// Fails only if the resulting text would span more than one line, which
/// would make the server read it as several commands.
pub fn encode_command(command: &Command<'_>) -> Result<String> {
    let text = match command {
        Command::Insert { document } => format!("INSERT {}", serde_json::to_string(document)?),
        Command::Find { query } => format!("FIND {}", serde_json::to_string(query)?),
        Command::Update { id, document } => {
            format!("UPDATE {} {}", id, serde_json::to_string(document)?)
        }
        Command::Delete { id } => format!("DELETE {}", id),
        Command::CreateIndex { field, kind } => format!("INDEX {} {}", field, kind.code()),
        Command::Get { filter } => match filter {
            GetFilter::All => "GET".to_string(),
            GetFilter::Id(id) => format!("GET {}", id),
            GetFilter::Range(start, end) => format!("GET {}-{}", start, end),
            GetFilter::Raw(text) if text.trim().is_empty() => "GET".to_string(),
            GetFilter::Raw(text) => format!("GET {}", text),
        },
        Command::Use { database } => format!("USE {}", database),
        Command::ShowDatabases => "SHOW DBS".to_string(),
        Command::DropDatabase { database } => format!("DROP DATABASE {}", database),
        Command::FlushDb => "FLUSHDB".to_string(),
        Command::Checkpoint => "CHECKPOINT".to_string(),
        Command::Config { param, enabled } => format!("CONFIG {} {}", param, u8::from(*enabled)),
        Command::Stats => "STATS".to_string(),
        Command::Expire { id, seconds } => format!("EXPIRE {} {}", id, seconds),
        Command::Publish { channel, message } => format!("PUBLISH {} {}", channel, message),
        Command::Help => "HELP".to_string(),
        Command::Raw(text) => text.to_string(),
    };

    if text.contains(|c: char| c == '\n' || c == '\r') {
        return Err(FluxError::Serialization(format!(
            "{:?} command spans more than one line",
            command.command_type()
        )));
    }

    Ok(text)
}

// =============================================================================
// Reply Decoding
// =============================================================================

/// Classify a reply by the prefix of its first line
///
/// Never fails: text that does not match a known shape is returned as
/// [`Reply::Unrecognized`].
pub fn decode_reply(text: &str) -> Reply {
    let text = text.trim();
    let header = text.lines().next().unwrap_or("").trim_end();

    if let Some(id) = header.strip_prefix(PREFIX_INSERTED) {
        return match id.trim().parse::<DocId>() {
            Ok(id) => Reply::Inserted(id),
            Err(_) => Reply::Unrecognized(text.to_string()),
        };
    }

    if let Some(count) = header.strip_prefix(PREFIX_COUNT) {
        return match count.trim().parse::<usize>() {
            Ok(count) => Reply::Listing(decode_listing(text.lines().skip(1), count)),
            Err(_) => Reply::Unrecognized(text.to_string()),
        };
    }

    if header.starts_with(PREFIX_UPDATED) {
        return Reply::Updated;
    }

    if header.starts_with(PREFIX_DELETED) {
        return Reply::Deleted;
    }

    if header.starts_with(PREFIX_OBJECT) {
        return match serde_json::from_str::<Document>(&text[PREFIX_OK.len() + 1..]) {
            Ok(document) => Reply::Object(document),
            Err(e) => {
                tracing::debug!("Undecodable object reply: {}", e);
                Reply::Unrecognized(text.to_string())
            }
        };
    }

    // Matched anywhere in the reply, not only as a prefix: servers that
    // prepend status text to the acknowledgement still count as success
    if text.contains(MARKER_INDEX_CREATED) {
        return Reply::IndexCreated;
    }

    if let Some(reason) = header.strip_prefix(PREFIX_ERROR) {
        if reason.is_empty() || reason.starts_with(' ') {
            return Reply::Error(reason.trim().to_string());
        }
    }

    if let Some(rest) = text.strip_prefix(PREFIX_OK) {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Reply::Ack(rest.trim().to_string());
        }
    }

    Reply::Unrecognized(text.to_string())
}

/// Decode the `ID ...` lines of a listing, skipping malformed ones
fn decode_listing<'a>(lines: impl Iterator<Item = &'a str>, expected: usize) -> Vec<ListingEntry> {
    let mut entries = Vec::with_capacity(expected);

    for line in lines {
        let line = line.trim_end();
        match decode_listing_line(line) {
            Some(entry) => entries.push(entry),
            None => tracing::debug!("Skipping malformed listing line: {:?}", line),
        }
    }

    if entries.len() != expected {
        tracing::debug!(
            "Listing announced {} entries, decoded {}",
            expected,
            entries.len()
        );
    }

    entries
}

fn decode_listing_line(line: &str) -> Option<ListingEntry> {
    let rest = line.strip_prefix(PREFIX_ID_LINE)?;
    let (id, json) = match rest.split_once(' ') {
        Some((id, json)) => (id, json.trim()),
        None => (rest, ""),
    };
    let id = id.parse::<DocId>().ok()?;

    if json.is_empty() {
        return Some(ListingEntry { id, document: None });
    }

    let mut document: Document = serde_json::from_str(json).ok()?;
    document.insert(ID_FIELD.to_string(), id.into());
    Some(ListingEntry {
        id,
        document: Some(document),
    })
}

/// Number of lines following an `OK COUNT=<n>` header, if it is one
pub fn listing_len(header: &str) -> Option<usize> {
    header
        .trim_end()
        .strip_prefix(PREFIX_COUNT)?
        .trim()
        .parse()
        .ok()
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a command line to a stream
pub fn write_command<W: Write>(writer: &mut W, text: &str) -> io::Result<()> {
    writer.write_all(text.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Whether a reply's header is a bare `OK` whose body follows on later
/// lines with no announced length (the server's `HELP` reply)
pub fn has_open_body(reply: &str) -> bool {
    reply
        .lines()
        .next()
        .map_or(false, |header| header.trim_end() == PREFIX_OK)
}

/// Read one newline-delimited reply
///
/// Reads the header line, then the `n` lines announced by an
/// `OK COUNT=<n>` header. A listing that ends early (EOF or a read timeout
/// once the header has arrived) is returned with the complete lines that
/// did arrive. Bytes already sitting in the reader's buffer afterwards are
/// part of the same reply and are appended.
pub fn read_delimited_reply<R: Read>(reader: &mut BufReader<R>) -> io::Result<String> {
    let mut raw = Vec::new();
    reader.read_until(b'\n', &mut raw)?;
    if raw.last() != Some(&b'\n') {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before the reply header was complete",
        ));
    }

    let remaining = listing_len(&String::from_utf8_lossy(&raw)).unwrap_or(0);
    for received in 0..remaining {
        let before = raw.len();
        match reader.read_until(b'\n', &mut raw) {
            Ok(_) => {}
            Err(e) if is_timeout(&e) => {
                tracing::debug!(
                    "Listing stalled after {} of {} lines: {}",
                    received,
                    remaining,
                    e
                );
                raw.truncate(before);
                break;
            }
            Err(e) => return Err(e),
        }
        if raw.len() == before || raw.last() != Some(&b'\n') {
            // Peer closed mid-listing: keep the complete lines only
            raw.truncate(before);
            break;
        }
    }

    let buffered = reader.buffer().len();
    if buffered > 0 {
        raw.extend_from_slice(reader.buffer());
        reader.consume(buffered);
    }

    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Read lines until the peer closes or a read times out
///
/// Used for bodies with no announced length; the caller sets the read
/// timeout to the idle window that ends the body.
pub fn read_until_idle<R: Read>(reader: &mut BufReader<R>) -> io::Result<String> {
    let mut raw = Vec::new();

    loop {
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if is_timeout(&e) => break,
            Err(e) => return Err(e),
        }
    }

    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Read one reply without a delimiter contract
///
/// Accumulates `chunk_size` reads until the peer closes, a read times out
/// after data has arrived, or a read returns fewer bytes than requested.
/// A reply whose last chunk exactly fills the buffer is only terminated by
/// the read timeout.
pub fn read_heuristic_reply<R: Read>(reader: &mut R, chunk_size: usize) -> io::Result<String> {
    let chunk_size = chunk_size.max(1);
    let mut accumulated = BytesMut::with_capacity(chunk_size);
    let mut chunk = vec![0u8; chunk_size];

    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                accumulated.extend_from_slice(&chunk[..n]);
                if n < chunk_size {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_timeout(&e) && !accumulated.is_empty() => break,
            Err(e) => return Err(e),
        }
    }

    if accumulated.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before any reply arrived",
        ));
    }

    Ok(String::from_utf8_lossy(&accumulated).into_owned())
}

/// Read timeouts surface as `WouldBlock` on Unix and `TimedOut` on Windows
fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
