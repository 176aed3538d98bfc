use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use docingest_core::error::{Error, Result};
use docingest_core::traits::{Meter, StoreTransport};
use docingest_core::types::{BulkItemResponse, BulkOperation, BulkResponse, IndexingError, IndexingErrorKind, IndexingRequest};

use crate::chunked::{Chunk, ChunkFailure, ChunkOutcome, EntityTooLarge};

/// Sends the pending part of a [`Chunk`] to a store, one bulk call per group
/// of at most `chunk.size` requests, strictly in list order.
pub struct BulkExecutor<'a, S: StoreTransport + ?Sized> {
    store: &'a S,
    invalid_timestamp_meter: &'a dyn Meter,
}

impl<'a, S: StoreTransport + ?Sized> BulkExecutor<'a, S> {
    pub fn new(store: &'a S, invalid_timestamp_meter: &'a dyn Meter) -> Self {
        Self { store, invalid_timestamp_meter }
    }

    pub fn execute_chunk(&self, chunk: Chunk<'_>) -> std::result::Result<ChunkOutcome, ChunkFailure> {
        let requests = chunk.requests;
        if requests.is_empty() {
            return Ok(ChunkOutcome::default());
        }
        if chunk.size == 0 || chunk.offset > requests.len() {
            return Err(Error::Operation(format!(
                "invalid chunk: offset {} size {} over {} requests",
                chunk.offset,
                chunk.size,
                requests.len()
            ))
            .into());
        }

        let mut outcome = ChunkOutcome::default();
        let mut start = chunk.offset;
        for (chunk_no, group) in chunk.pending().chunks(chunk.size).enumerate() {
            let operations = group.iter().map(|r| self.operation_from(r)).collect::<Result<Vec<_>>>()?;
            debug!(chunk = chunk_no + 1, offset = start, size = group.len(), "Sending bulk request");

            let response = match self.store.bulk(&operations) {
                Ok(response) => response,
                Err(e) if e.is_entity_too_large() => {
                    debug!(chunk = chunk_no + 1, accepted = outcome.processed, "Bulk request refused as too large");
                    return Err(ChunkFailure::EntityTooLarge(EntityTooLarge {
                        indexed_successfully: outcome.processed,
                        failed_items: outcome.errors,
                        remaining: start..requests.len(),
                    }));
                }
                Err(e) => return Err(Error::from(e).into()),
            };

            outcome.processed += group.len();
            outcome.errors.extend(indexing_errors_from(&response, group)?);
            start += group.len();
        }
        Ok(outcome)
    }

    fn operation_from(&self, request: &IndexingRequest) -> Result<BulkOperation> {
        let message = request.message();
        let body = message.to_store_object(self.invalid_timestamp_meter);
        let source = serde_json::to_vec(&body)
            .map_err(|source| Error::Serialization { id: message.id().to_string(), source })?;
        Ok(BulkOperation {
            index: request.index_set().write_index_alias().to_string(),
            id: message.id().to_string(),
            source,
        })
    }
}

/// Map failed items back to the requests of `group`.
///
/// Items line up with operations when the store answers one item per
/// operation with matching ids. Otherwise they are matched by id, the last
/// request carrying an id winning.
fn indexing_errors_from(response: &BulkResponse, group: &[IndexingRequest]) -> Result<Vec<IndexingError>> {
    if !response.has_failures() {
        return Ok(Vec::new());
    }

    let positional = response.items.len() == group.len()
        && response.items.iter().zip(group).all(|(item, request)| item.id == request.message().id());
    let by_id: HashMap<&str, &IndexingRequest> = if positional {
        HashMap::new()
    } else {
        group.iter().map(|request| (request.message().id(), request)).collect()
    };

    let mut errors = Vec::new();
    for (position, item) in response.items.iter().enumerate() {
        let Some(cause) = item.failure_message() else { continue };
        let request = if positional {
            &group[position]
        } else {
            by_id.get(item.id.as_str()).copied().ok_or_else(|| {
                Error::Operation(format!("store reported a failure for unknown document <{}>", item.id))
            })?
        };
        errors.push(IndexingError::new(
            Arc::clone(request.message()),
            request.index_set().write_index_alias(),
            error_kind_from(item),
            cause,
        ));
    }
    Ok(errors)
}

// Every store-reported item failure lands in the single fallback bucket.
fn error_kind_from(_item: &BulkItemResponse) -> IndexingErrorKind {
    IndexingErrorKind::Unknown
}
