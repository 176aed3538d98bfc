use thiserror::Error;

/// HTTP-style status a store uses to refuse a bulk call whose payload is too big.
pub const REQUEST_ENTITY_TOO_LARGE: u16 = 413;

/// Failures reported by a `StoreTransport`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store returned status {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store backend failed: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn entity_too_large(reason: impl Into<String>) -> Self {
        Self::Status { status: REQUEST_ENTITY_TOO_LARGE, reason: reason.into() }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_entity_too_large(&self) -> bool {
        self.status() == Some(REQUEST_ENTITY_TOO_LARGE)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Document <{id}> not found in index <{index}>")]
    DocumentNotFound { index: String, id: String },

    #[error("Failed to serialize message <{id}>: {source}")]
    Serialization {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
