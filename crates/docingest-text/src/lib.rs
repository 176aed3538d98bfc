//! docingest-text
//!
//! A tantivy-backed document store implementing `StoreTransport`, used as the
//! reference target of the bulk indexing pipeline and by the CLI.

pub mod index;
pub mod mapping;
pub mod tantivy_utils;

pub use index::TantivyStore;
