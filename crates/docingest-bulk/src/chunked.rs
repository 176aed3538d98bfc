//! Chunk-size control for bulk indexing.
//!
//! [`ChunkedBulkIndexer`] drives a bulk callback over a request list. When the
//! store refuses a call as too large, the callback reports how many requests
//! it already had accepted; the indexer moves its offset past them, halves the
//! chunk size and calls again. Requests behind the offset are never sent twice.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use docingest_core::error::{Error, Result};
use docingest_core::types::{IndexingError, IndexingErrorKind, IndexingRequest};

/// The part of `requests` one callback invocation is responsible for.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub requests: &'a [IndexingRequest],
    /// Index of the first request not yet accepted by the store.
    pub offset: usize,
    /// Maximum number of requests per bulk call.
    pub size: usize,
}

impl<'a> Chunk<'a> {
    pub fn pending(&self) -> &'a [IndexingRequest] {
        &self.requests[self.offset.min(self.requests.len())..]
    }
}

/// What a callback invocation achieved when no call was refused.
#[derive(Debug, Default)]
pub struct ChunkOutcome {
    /// Requests the store accepted at the transport level, failed ones included.
    pub processed: usize,
    pub errors: Vec<IndexingError>,
}

impl ChunkOutcome {
    /// Requests that were durably written.
    pub fn indexed(&self) -> usize {
        self.processed.saturating_sub(self.errors.len())
    }
}

/// The store refused a bulk call as too large.
#[derive(Debug)]
pub struct EntityTooLarge {
    /// Requests accepted by earlier calls of the same invocation.
    pub indexed_successfully: usize,
    /// Per-document errors those earlier calls produced.
    pub failed_items: Vec<IndexingError>,
    /// Positions in the request list that still have to be sent.
    pub remaining: Range<usize>,
}

impl fmt::Display for EntityTooLarge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bulk request entity too large after {} accepted requests, {} remaining",
            self.indexed_successfully,
            self.remaining.len()
        )
    }
}

#[derive(Debug, Error)]
pub enum ChunkFailure {
    #[error("{0}")]
    EntityTooLarge(EntityTooLarge),

    #[error(transparent)]
    Store(#[from] Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkedBulkIndexer {
    output_batch_size: Option<usize>,
}

impl ChunkedBulkIndexer {
    /// `None` starts with the whole list in one call.
    pub fn new(output_batch_size: Option<usize>) -> Self {
        Self { output_batch_size }
    }

    fn initial_chunk_size(&self, total: usize) -> usize {
        let upper = total.max(1);
        self.output_batch_size.unwrap_or(upper).clamp(1, upper)
    }

    /// Index `requests` through `bulk_index` and return every per-document error.
    ///
    /// A document that is refused even in a call of its own is reported with
    /// [`IndexingErrorKind::EntityTooLarge`] and skipped. Any other failure of
    /// the callback aborts and is returned as is.
    pub fn index<F>(&self, requests: &[IndexingRequest], mut bulk_index: F) -> Result<Vec<IndexingError>>
    where
        F: FnMut(Chunk<'_>) -> std::result::Result<ChunkOutcome, ChunkFailure>,
    {
        let initial = self.initial_chunk_size(requests.len());
        let mut chunk_size = initial;
        let mut offset = 0;
        let mut failed_messages = Vec::new();

        loop {
            let too_large = match bulk_index(Chunk { requests, offset, size: chunk_size }) {
                Ok(outcome) => {
                    debug!(processed = outcome.processed, failed = outcome.errors.len(), "Chunked bulk indexing done");
                    failed_messages.extend(outcome.errors);
                    return Ok(failed_messages);
                }
                Err(ChunkFailure::Store(e)) => return Err(e),
                Err(ChunkFailure::EntityTooLarge(too_large)) => too_large,
            };

            offset = offset.saturating_add(too_large.indexed_successfully);
            if too_large.remaining.start != offset || offset >= requests.len() {
                return Err(Error::Operation(format!(
                    "bulk callback reported {} accepted requests but {} remaining from position {}, expected {} of {}",
                    too_large.indexed_successfully,
                    too_large.remaining.len(),
                    too_large.remaining.start,
                    offset,
                    requests.len()
                )));
            }
            failed_messages.extend(too_large.failed_items);

            if chunk_size > 1 {
                warn!(
                    "Bulk index failed with 'Request Entity Too Large' error. Retrying by splitting up batch size <{}>.",
                    chunk_size
                );
                if chunk_size == initial {
                    warn!("Consider lowering the \"output_batch_size\" setting, or raising the store's request size limit.");
                }
                chunk_size /= 2;
                continue;
            }

            let request = &requests[offset];
            let alias = request.index_set().write_index_alias();
            warn!(message_id = %request.message().id(), index = %alias, "Message exceeds the store's request size limit on its own, not retrying");
            failed_messages.push(IndexingError::new(
                Arc::clone(request.message()),
                alias,
                IndexingErrorKind::EntityTooLarge,
                "document alone exceeds the store's request size limit",
            ));
            offset += 1;
            if offset == requests.len() {
                return Ok(failed_messages);
            }
        }
    }
}
