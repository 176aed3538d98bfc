use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::{Index, TantivyError};

pub const STOPWORDS_ANALYZER: &str = "text_with_stopwords";

/// Handles to the fields of [`build_schema`].
#[derive(Debug, Clone, Copy)]
pub struct StoreFields {
	pub uid: Field,
	pub id: Field,
	pub index: Field,
	pub source: Field,
	pub message: Field,
}

impl StoreFields {
	pub fn from_schema(schema: &Schema) -> Result<Self, TantivyError> {
		Ok(Self {
			uid: schema.get_field("uid")?,
			id: schema.get_field("id")?,
			index: schema.get_field("index")?,
			source: schema.get_field("source")?,
			message: schema.get_field("message")?,
		})
	}
}

/// `uid` is `<index>/<id>` and is what replaces a previous version on write.
pub fn uid(index: &str, id: &str) -> String { format!("{}/{}", index, id) }

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _uid_field = schema_builder.add_text_field("uid", STRING | STORED);
	let _id_field = schema_builder.add_text_field("id", STRING | STORED);
	let _index_field = schema_builder.add_text_field("index", STRING | STORED);
	let _source_field = schema_builder.add_text_field("source", TextOptions::default().set_stored());
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(STOPWORDS_ANALYZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let _message_field = schema_builder.add_text_field("message", TextOptions::default().set_indexing_options(text_field_indexing));
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let stop_words = vec![
		"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(STOPWORDS_ANALYZER, tokenizer);
}
