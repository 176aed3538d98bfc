//! docingest-bulk
//!
//! Adaptive chunked bulk indexing: [`BulkExecutor`] sends a request list to a
//! store in fixed-size groups, [`ChunkedBulkIndexer`] shrinks the group size
//! when the store refuses a call as too large, and [`MessagesAdapter`] puts
//! both behind a small facade together with single-document reads and text
//! analysis.

pub mod adapter;
pub mod chunked;
pub mod executor;

pub use adapter::MessagesAdapter;
pub use chunked::{Chunk, ChunkFailure, ChunkOutcome, ChunkedBulkIndexer, EntityTooLarge};
pub use executor::BulkExecutor;
