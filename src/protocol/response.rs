//! Response definitions
//!
//! Represents decoded server replies.

use crate::document::{DocId, Document};

/// One line of an `OK COUNT=` listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub id: DocId,

    /// Present when the line carried a JSON document (`_id` injected)
    pub document: Option<Document>,
}

/// A reply, classified by the prefix of its first line
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `OK ID=<id>`
    Inserted(DocId),

    /// `OK COUNT=<n>` followed by `ID ...` lines
    Listing(Vec<ListingEntry>),

    /// `OK UPDATED`
    Updated,

    /// `OK DELETED`
    Deleted,

    /// `OK INDEX_CREATED` anywhere in the reply
    IndexCreated,

    /// `OK {...}`
    Object(Document),

    /// Any other `OK <text>` acknowledgement (text after `OK `)
    Ack(String),

    /// `ERROR <reason>`
    Error(String),

    /// Anything else, kept verbatim
    Unrecognized(String),
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        !matches!(self, Reply::Error(_) | Reply::Unrecognized(_))
    }

    /// Ids of a listing, in server order
    pub fn ids(&self) -> Option<Vec<DocId>> {
        match self {
            Reply::Listing(entries) => Some(entries.iter().map(|e| e.id).collect()),
            _ => None,
        }
    }

    /// Short description used as the failure reason of an operation
    pub fn describe(&self) -> String {
        match self {
            Reply::Inserted(id) => format!("OK ID={}", id),
            Reply::Listing(entries) => format!("OK COUNT={}", entries.len()),
            Reply::Updated => "OK UPDATED".to_string(),
            Reply::Deleted => "OK DELETED".to_string(),
            Reply::IndexCreated => "OK INDEX_CREATED".to_string(),
            Reply::Object(_) => "OK {...}".to_string(),
            Reply::Ack(text) => format!("OK {}", text),
            Reply::Error(reason) => format!("ERROR {}", reason),
            Reply::Unrecognized(text) => text.clone(),
        }
    }
}
