//! Domain types shared by the pipeline and store implementations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::message::Message;

/// A stored document body as the store sees it.
pub type Source = serde_json::Map<String, serde_json::Value>;

/// Destination of an indexing request. Writes always go to the write alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSet {
    write_index_alias: String,
}

impl IndexSet {
    pub fn new(write_index_alias: impl Into<String>) -> Self {
        Self { write_index_alias: write_index_alias.into() }
    }

    pub fn write_index_alias(&self) -> &str {
        &self.write_index_alias
    }
}

/// One message headed for one index set.
///
/// Requests are cheap to clone; the message body is shared.
#[derive(Debug, Clone)]
pub struct IndexingRequest {
    index_set: IndexSet,
    message: Arc<Message>,
}

impl IndexingRequest {
    pub fn new(index_set: IndexSet, message: impl Into<Arc<Message>>) -> Self {
        Self { index_set, message: message.into() }
    }

    pub fn index_set(&self) -> &IndexSet {
        &self.index_set
    }

    pub fn message(&self) -> &Arc<Message> {
        &self.message
    }
}

/// Classification of a per-document failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexingErrorKind {
    /// Store-reported failure that is not mapped to anything more specific.
    Unknown,
    /// The document alone exceeds the store's payload limit.
    EntityTooLarge,
}

impl fmt::Display for IndexingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::EntityTooLarge => f.write_str("entity_too_large"),
        }
    }
}

/// A message that was not written, with the reason.
#[derive(Debug, Clone)]
pub struct IndexingError {
    pub message: Arc<Message>,
    pub index: String,
    pub kind: IndexingErrorKind,
    pub cause: String,
}

impl IndexingError {
    pub fn new(message: Arc<Message>, index: impl Into<String>, kind: IndexingErrorKind, cause: impl Into<String>) -> Self {
        Self { message, index: index.into(), kind, cause: cause.into() }
    }

    pub fn message_id(&self) -> &str {
        self.message.id()
    }
}

impl fmt::Display for IndexingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> in <{}> [{}]: {}", self.message.id(), self.index, self.kind, self.cause)
    }
}

/// A single write inside a bulk call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOperation {
    pub index: String,
    pub id: String,
    pub source: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemFailure {
    /// Store-specific error type, e.g. `mapper_parsing_exception`.
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemResponse {
    pub index: String,
    pub id: String,
    pub failure: Option<BulkItemFailure>,
}

impl BulkItemResponse {
    pub fn ok(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self { index: index.into(), id: id.into(), failure: None }
    }

    pub fn failed(index: impl Into<String>, id: impl Into<String>, kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            failure: Some(BulkItemFailure { kind: kind.into(), reason: reason.into() }),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn failure_message(&self) -> Option<String> {
        self.failure.as_ref().map(|f| format!("{}: {}", f.kind, f.reason))
    }
}

/// Result of a bulk call the store accepted at the transport level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResponse {
    pub items: Vec<BulkItemResponse>,
}

impl BulkResponse {
    pub fn has_failures(&self) -> bool {
        self.items.iter().any(BulkItemResponse::is_failed)
    }
}

/// A message read back from a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub index: String,
    pub message: Message,
}

impl ResultMessage {
    pub fn parse_from_source(id: &str, index: &str, source: Source) -> Self {
        Self { index: index.to_string(), message: Message::new(id, source) }
    }
}
