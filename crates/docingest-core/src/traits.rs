use std::sync::Arc;

use crate::error::StoreError;
use crate::types::{BulkOperation, BulkResponse, Source};

/// The three calls the indexing pipeline needs from a document store.
///
/// Implementations are expected to be cheap to share; every method takes
/// `&self` and the pipeline never holds a store across threads mutably.
pub trait StoreTransport: Send + Sync {
    /// Fetch the stored body of `id` in `index`, `None` when it does not exist.
    fn get(&self, index: &str, id: &str) -> Result<Option<Source>, StoreError>;

    /// Run `analyzer` over `text` and return the produced terms in order.
    fn analyze(&self, index: &str, analyzer: &str, text: &str) -> Result<Vec<String>, StoreError>;

    /// Submit one bulk write call.
    ///
    /// A call that is too big as a whole must fail with
    /// [`StoreError::entity_too_large`] before anything is written. Otherwise
    /// the response carries one item per operation, in submission order.
    fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse, StoreError>;
}

impl<T: StoreTransport + ?Sized> StoreTransport for Arc<T> {
    fn get(&self, index: &str, id: &str) -> Result<Option<Source>, StoreError> {
        (**self).get(index, id)
    }

    fn analyze(&self, index: &str, analyzer: &str, text: &str) -> Result<Vec<String>, StoreError> {
        (**self).analyze(index, analyzer, text)
    }

    fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse, StoreError> {
        (**self).bulk(operations)
    }
}

/// Records one occurrence of an event per `mark`.
pub trait Meter: Send + Sync {
    fn mark(&self);
}
