use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docingest_bulk::{ChunkedBulkIndexer, MessagesAdapter};
use docingest_core::config::{expand_path, Config, IndexerConfig};
use docingest_core::data_processor::DataProcessor;
use docingest_core::types::{IndexSet, IndexingRequest};
use docingest_text::tantivy_utils::STOPWORDS_ANALYZER;
use docingest_text::TantivyStore;

/// Requests handed to one `bulk_index` call; the progress bar advances per batch.
const INGEST_BATCH: usize = 1000;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() { eprintln!("Usage: {} <ingest [dir] [--limit n]|get <id> [index]|analyze <text> [analyzer]>", prog); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let indexer = config.indexer()?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => {
            let mut data_dir = None; let mut limit = None;
            let mut i = 0; while i < args.len() { match args[i].as_str() {
                "--limit" => { match args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) { Some(n) => { limit = Some(n); i += 1; } None => { eprintln!("Error: --limit requires a number"); std::process::exit(1); } } }
                arg if !arg.starts_with('-') => data_dir = Some(PathBuf::from(arg)), _ => {} } i += 1; }
            let data_dir = data_dir.unwrap_or_else(|| {
                let dir: String = config.get("data.raw_dir").unwrap_or_else(|_| "./data/raw".to_string()); expand_path(dir)
            });
            ingest(&indexer, data_dir, limit)?;
        }
        "get" => {
            let Some(id) = args.first() else { eprintln!("Usage: docingest get <id> [index]"); std::process::exit(1) };
            let index = args.get(1).map(String::as_str).unwrap_or(indexer.write_alias.as_str());
            let store = TantivyStore::open(indexer.index_path(), indexer.max_payload_bytes)
                .with_context(|| format!("opening index at {}", indexer.index_path().display()))?;
            let adapter = MessagesAdapter::new(store, ChunkedBulkIndexer::new(indexer.output_batch_size));
            let found = adapter.get(id, index)?;
            println!("{}", serde_json::to_string_pretty(found.message.fields())?);
        }
        "analyze" => {
            let Some(text) = args.first() else { eprintln!("Usage: docingest analyze <text> [analyzer]"); std::process::exit(1) };
            let analyzer = args.get(1).map(String::as_str).unwrap_or(STOPWORDS_ANALYZER);
            let store = if indexer.index_path().exists() {
                TantivyStore::open(indexer.index_path(), indexer.max_payload_bytes)?
            } else {
                TantivyStore::in_memory(indexer.max_payload_bytes)?
            };
            let adapter = MessagesAdapter::new(store, ChunkedBulkIndexer::new(indexer.output_batch_size));
            for term in adapter.analyze(text, &indexer.write_alias, analyzer)? { println!("{}", term); }
        }
        _ => { eprintln!("Unknown command: {}", cmd); std::process::exit(1); }
    }
    Ok(())
}

fn ingest(indexer: &IndexerConfig, data_dir: PathBuf, limit: Option<usize>) -> anyhow::Result<()> {
    println!("Ingesting from {}", data_dir.display());
    let data_processor = DataProcessor::new();
    let messages = match limit {
        Some(limit) => data_processor.process_directory_limited(&data_dir, limit)?,
        None => data_processor.process_directory(&data_dir)?,
    };
    if messages.is_empty() { println!("No messages found"); return Ok(()); }

    let index_dir = indexer.index_path();
    let store = TantivyStore::create(index_dir.clone(), indexer.max_payload_bytes)?;
    info!(index_dir = %index_dir.display(), max_payload_bytes = indexer.max_payload_bytes, "Created index");
    let adapter = MessagesAdapter::new(store, ChunkedBulkIndexer::new(indexer.output_batch_size));

    let index_set = IndexSet::new(indexer.write_alias.clone());
    let requests: Vec<IndexingRequest> = messages.into_iter().map(|m| IndexingRequest::new(index_set.clone(), m)).collect();

    let pb = ProgressBar::new(requests.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} messages ({percent}%) {msg}")?.progress_chars("#>-"));
    pb.enable_steady_tick(Duration::from_millis(100));
    let mut failures = Vec::new();
    for batch in requests.chunks(INGEST_BATCH) {
        failures.extend(adapter.bulk_index(batch)?);
        pb.inc(batch.len() as u64);
        pb.set_message(format!("{} failed", failures.len()));
    }
    pb.finish_with_message(format!("done, {} failed", failures.len()));

    for failure in &failures {
        warn!(message_id = %failure.message_id(), index = %failure.index, kind = %failure.kind, "{}", failure.cause);
    }
    println!("Indexed {} of {} messages into {}", adapter.store().num_docs(), requests.len(), indexer.write_alias);
    if !failures.is_empty() { println!("{} messages failed, see log for details", failures.len()); }
    Ok(())
}
