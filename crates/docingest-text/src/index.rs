use std::fmt::Display;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tantivy::collector::TopDocs;
use tantivy::query::TermQuery;
use tantivy::schema::{IndexRecordOption, Value as _};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

use docingest_core::error::StoreError;
use docingest_core::traits::StoreTransport;
use docingest_core::types::{BulkItemFailure, BulkItemResponse, BulkOperation, BulkResponse, Source};

use crate::mapping::MappingRegistry;
use crate::tantivy_utils::{build_schema, register_tokenizer, uid, StoreFields};

const WRITER_MEMORY_BYTES: usize = 50_000_000;
const BAD_REQUEST: u16 = 400;

struct WriteState {
	writer: IndexWriter,
	mappings: MappingRegistry,
}

/// A document store over a single tantivy index.
///
/// Every accepted bulk call is committed before it returns, so the items it
/// reports as successful are durable. Calls whose summed body size exceeds
/// `max_payload_bytes` are refused whole.
pub struct TantivyStore {
	index: Index,
	reader: IndexReader,
	fields: StoreFields,
	state: Mutex<WriteState>,
	max_payload_bytes: usize,
}

fn backend<E: Display>(e: E) -> StoreError { StoreError::Backend(e.to_string()) }

impl TantivyStore {
	pub fn in_memory(max_payload_bytes: usize) -> Result<Self, StoreError> {
		Self::from_index(Index::create_in_ram(build_schema()), max_payload_bytes)
	}

	/// Create a fresh on-disk store; an existing directory is replaced.
	pub fn create(index_dir: PathBuf, max_payload_bytes: usize) -> Result<Self, StoreError> {
		if index_dir.exists() { std::fs::remove_dir_all(&index_dir)?; }
		std::fs::create_dir_all(&index_dir)?;
		let index = Index::create_in_dir(&index_dir, build_schema()).map_err(backend)?;
		Self::from_index(index, max_payload_bytes)
	}

	/// Open a store written by an earlier run. Field mappings are relearned
	/// from the documents written after opening.
	pub fn open(index_dir: PathBuf, max_payload_bytes: usize) -> Result<Self, StoreError> {
		let index = Index::open_in_dir(&index_dir).map_err(backend)?;
		Self::from_index(index, max_payload_bytes)
	}

	fn from_index(index: Index, max_payload_bytes: usize) -> Result<Self, StoreError> {
		register_tokenizer(&index);
		let fields = StoreFields::from_schema(&index.schema()).map_err(backend)?;
		let writer = index.writer(WRITER_MEMORY_BYTES).map_err(backend)?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(backend)?;
		Ok(Self { index, reader, fields, state: Mutex::new(WriteState { writer, mappings: MappingRegistry::default() }), max_payload_bytes })
	}

	/// Number of live documents across all indices.
	pub fn num_docs(&self) -> u64 { self.reader.searcher().num_docs() }

	fn lock_state(&self) -> Result<MutexGuard<'_, WriteState>, StoreError> {
		self.state.lock().map_err(|_| StoreError::Backend("index writer lock poisoned".to_string()))
	}

	fn prepare(&self, op: &BulkOperation, mappings: &mut MappingRegistry) -> Result<TantivyDocument, BulkItemFailure> {
		if op.id.is_empty() {
			return Err(failure("action_request_validation_exception", "id is missing"));
		}
		let source = match serde_json::from_slice::<Value>(&op.source) {
			Ok(Value::Object(source)) => source,
			Ok(_) => return Err(failure("document_parsing_exception", "document body must be a JSON object")),
			Err(e) => return Err(failure("document_parsing_exception", e.to_string())),
		};
		mappings
			.check_and_register(&op.index, &source)
			.map_err(|conflict| failure("mapper_parsing_exception", conflict.to_string()))?;
		let message = source.get("message").and_then(Value::as_str).unwrap_or_default().to_string();
		Ok(doc!(
			self.fields.uid => uid(&op.index, &op.id),
			self.fields.id => op.id.clone(),
			self.fields.index => op.index.clone(),
			self.fields.source => String::from_utf8_lossy(&op.source).into_owned(),
			self.fields.message => message,
		))
	}

	/// Build the documents of a call against a copy of `mappings`; nothing is
	/// written and the committed mappings are left alone.
	fn stage(&self, operations: &[BulkOperation], mappings: &MappingRegistry) -> Staged {
		let mut pending = mappings.clone();
		let mut documents = Vec::with_capacity(operations.len());
		let mut items = Vec::with_capacity(operations.len());
		for op in operations {
			match self.prepare(op, &mut pending) {
				Ok(document) => {
					documents.push((uid(&op.index, &op.id), document));
					items.push(BulkItemResponse::ok(op.index.clone(), op.id.clone()));
				}
				Err(failure) => items.push(BulkItemResponse { index: op.index.clone(), id: op.id.clone(), failure: Some(failure) }),
			}
		}
		Staged { documents, items, mappings: pending }
	}

	/// Replace and commit `documents`. On error the caller rolls the writer back.
	fn apply(&self, writer: &mut IndexWriter, documents: Vec<(String, TantivyDocument)>) -> Result<(), StoreError> {
		for (uid, document) in documents {
			writer.delete_term(Term::from_field_text(self.fields.uid, &uid));
			writer.add_document(document).map_err(backend)?;
		}
		writer.commit().map_err(backend)?;
		Ok(())
	}
}

struct Staged {
	documents: Vec<(String, TantivyDocument)>,
	items: Vec<BulkItemResponse>,
	mappings: MappingRegistry,
}

fn failure(kind: &str, reason: impl Into<String>) -> BulkItemFailure {
	BulkItemFailure { kind: kind.to_string(), reason: reason.into() }
}

impl StoreTransport for TantivyStore {
	fn get(&self, index: &str, id: &str) -> Result<Option<Source>, StoreError> {
		let searcher = self.reader.searcher();
		let query = TermQuery::new(Term::from_field_text(self.fields.uid, &uid(index, id)), IndexRecordOption::Basic);
		let top_docs = searcher.search(&query, &TopDocs::with_limit(1)).map_err(backend)?;
		let Some((_, addr)) = top_docs.into_iter().next() else { return Ok(None) };
		let doc: TantivyDocument = searcher.doc(addr).map_err(backend)?;
		let raw = doc.get_first(self.fields.source).and_then(|v| v.as_str()).unwrap_or("{}");
		match serde_json::from_str::<Value>(raw).map_err(backend)? {
			Value::Object(source) => Ok(Some(source)),
			_ => Err(StoreError::Backend(format!("stored body of <{}> is not an object", id))),
		}
	}

	fn analyze(&self, index: &str, analyzer: &str, text: &str) -> Result<Vec<String>, StoreError> {
		debug!(index, analyzer, "Analyzing {} bytes", text.len());
		let mut text_analyzer = self.index.tokenizers().get(analyzer).ok_or_else(|| StoreError::Status {
			status: BAD_REQUEST,
			reason: format!("failed to find analyzer [{}]", analyzer),
		})?;
		let mut tokens = Vec::new();
		let mut stream = text_analyzer.token_stream(text);
		stream.process(&mut |token| tokens.push(token.text.clone()));
		Ok(tokens)
	}

	fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse, StoreError> {
		let payload: usize = operations.iter().map(|op| op.source.len()).sum();
		if payload > self.max_payload_bytes {
			return Err(StoreError::entity_too_large(format!(
				"bulk body of {} bytes exceeds the limit of {} bytes",
				payload, self.max_payload_bytes
			)));
		}
		let mut state = self.lock_state()?;
		let WriteState { writer, mappings } = &mut *state;
		let staged = self.stage(operations, mappings);
		if let Err(e) = self.apply(writer, staged.documents) {
			writer.rollback().map_err(backend)?;
			return Err(e);
		}
		*mappings = staged.mappings;
		self.reader.reload().map_err(backend)?;
		debug!(operations = operations.len(), payload, "Committed bulk call");
		Ok(BulkResponse { items: staged.items })
	}
}
