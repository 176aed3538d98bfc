use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::message::Message;

/// Reads `*.jsonl` files, one JSON object per line, into messages.
///
/// Lines without an `_id`/`id` get `<file stem>:<line number>`. Blank lines
/// are ignored; lines that are not JSON objects are logged and skipped.
#[derive(Default)]
pub struct DataProcessor;

impl DataProcessor {
    pub fn new() -> Self { Self }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Message>> {
        self.process_files(data_dir, self.list_jsonl_files(data_dir))
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<Message>> {
        let mut files = self.list_jsonl_files(data_dir);
        if files.len() > limit { files.truncate(limit); info!("Limited to first {} files", limit); }
        self.process_files(data_dir, files)
    }

    fn process_files(&self, data_dir: &Path, files: Vec<PathBuf>) -> Result<Vec<Message>> {
        if files.is_empty() {
            info!("No .jsonl files found under {}", data_dir.display());
            return Ok(vec![]);
        }
        let mut all_messages = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            info!("Processing file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            let content = fs::read_to_string(file_path).with_context(|| format!("reading {}", file_path.display()))?;
            all_messages.extend(self.parse_lines(&content, &self.file_stem(file_path)));
        }
        info!("Processed {} files into {} messages", files.len(), all_messages.len());
        Ok(all_messages)
    }

    pub fn parse_lines(&self, content: &str, stem: &str) -> Vec<Message> {
        let mut messages = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() { continue; }
            let mut fields = match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(fields)) => fields,
                Ok(_) => { warn!("{}:{} is not a JSON object, skipping", stem, line_no + 1); continue; }
                Err(e) => { warn!("{}:{} is not valid JSON ({}), skipping", stem, line_no + 1, e); continue; }
            };
            if !fields.contains_key("_id") && !fields.contains_key("id") {
                fields.insert("_id".to_string(), Value::String(format!("{}:{}", stem, line_no + 1)));
            }
            match Message::from_source(fields) {
                Some(message) => messages.push(message),
                None => warn!("{}:{} has an unusable id, skipping", stem, line_no + 1),
            }
        }
        messages
    }

    fn file_stem(&self, file_path: &Path) -> String {
        file_path.file_stem().map_or_else(|| "input".to_string(), |s| s.to_string_lossy().to_string())
    }

    fn list_jsonl_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("jsonl") { files.push(path.to_path_buf()); }
        }
        files.sort(); files
    }
}
