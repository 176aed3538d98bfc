use std::sync::Arc;

use tracing::{debug, info};

use docingest_core::error::{Error, Result};
use docingest_core::metrics::InvalidTimestampMeter;
use docingest_core::traits::{Meter, StoreTransport};
use docingest_core::types::{IndexingError, IndexingRequest, ResultMessage};

use crate::chunked::ChunkedBulkIndexer;
use crate::executor::BulkExecutor;

/// Message reads, analysis and bulk writes against one store.
pub struct MessagesAdapter<S> {
    store: S,
    invalid_timestamp_meter: Arc<dyn Meter>,
    chunked_bulk_indexer: ChunkedBulkIndexer,
}

impl<S: StoreTransport> MessagesAdapter<S> {
    /// Invalid timestamps are counted on the global `messages.invalid-timestamps` instrument.
    pub fn new(store: S, chunked_bulk_indexer: ChunkedBulkIndexer) -> Self {
        Self::with_meter(store, Arc::new(InvalidTimestampMeter::default()), chunked_bulk_indexer)
    }

    pub fn with_meter(store: S, invalid_timestamp_meter: Arc<dyn Meter>, chunked_bulk_indexer: ChunkedBulkIndexer) -> Self {
        Self { store, invalid_timestamp_meter, chunked_bulk_indexer }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn get(&self, message_id: &str, index: &str) -> Result<ResultMessage> {
        match self.store.get(index, message_id)? {
            Some(source) => Ok(ResultMessage::parse_from_source(message_id, index, source)),
            None => Err(Error::DocumentNotFound { index: index.to_string(), id: message_id.to_string() }),
        }
    }

    pub fn analyze(&self, to_analyze: &str, index: &str, analyzer: &str) -> Result<Vec<String>> {
        Ok(self.store.analyze(index, analyzer, to_analyze)?)
    }

    /// Write `requests` and return the ones that failed.
    ///
    /// Every request ends up either written or in the returned list, never
    /// both. Store failures other than a too-large refusal abort the call.
    pub fn bulk_index(&self, requests: &[IndexingRequest]) -> Result<Vec<IndexingError>> {
        let executor = BulkExecutor::new(&self.store, self.invalid_timestamp_meter.as_ref());
        let errors = self.chunked_bulk_indexer.index(requests, |chunk| executor.execute_chunk(chunk))?;
        if errors.is_empty() {
            debug!(requests = requests.len(), "Bulk indexing succeeded");
        } else {
            info!(requests = requests.len(), failed = errors.len(), "Bulk indexing finished with failures");
        }
        Ok(errors)
    }
}
