#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use docingest_core::error::StoreError;
use docingest_core::message::Message;
use docingest_core::traits::{Meter, StoreTransport};
use docingest_core::types::{BulkItemResponse, BulkOperation, BulkResponse, IndexSet, IndexingRequest, Source};
use serde_json::{json, Value};

pub const ALIAS: &str = "graylog_deflector";

/// Meter that remembers how often it was marked.
#[derive(Debug, Default)]
pub struct CountingMeter(AtomicU64);

impl CountingMeter {
    pub fn count(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Meter for CountingMeter {
    fn mark(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

/// In-memory store that records every bulk call it receives.
///
/// - ids in `oversized` make any call containing them too large
/// - ids in `bulky` make a call too large unless they are sent alone
/// - ids in `failing` are accepted at transport level but fail per item
/// - `fatal_on_call` fails the n-th call (1-based) with a 503
/// - non-positional stores answer failed items only, in reverse order
#[derive(Default)]
pub struct RecordingStore {
    pub oversized: HashSet<String>,
    pub bulky: HashSet<String>,
    pub failing: HashSet<String>,
    pub fatal_on_call: Option<usize>,
    pub non_positional: bool,
    calls: Mutex<Vec<Call>>,
    documents: Mutex<HashMap<(String, String), Source>>,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub ids: Vec<String>,
    pub accepted: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn oversized(mut self, ids: &[&str]) -> Self {
        self.oversized.extend(ids.iter().map(|s| s.to_string()));
        self
    }

    pub fn bulky(mut self, ids: &[&str]) -> Self {
        self.bulky.extend(ids.iter().map(|s| s.to_string()));
        self
    }

    pub fn failing(mut self, ids: &[&str]) -> Self {
        self.failing.extend(ids.iter().map(|s| s.to_string()));
        self
    }

    pub fn fatal_on_call(mut self, call: usize) -> Self {
        self.fatal_on_call = Some(call);
        self
    }

    pub fn non_positional(mut self) -> Self {
        self.non_positional = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn accepted_calls(&self) -> Vec<Vec<String>> {
        self.calls().into_iter().filter(|c| c.accepted).map(|c| c.ids).collect()
    }

    /// Ids durably written, in write order.
    pub fn written(&self) -> Vec<String> {
        self.accepted_calls().into_iter().flatten().filter(|id| !self.failing.contains(id)).collect()
    }

    pub fn document(&self, index: &str, id: &str) -> Option<Source> {
        self.documents.lock().unwrap().get(&(index.to_string(), id.to_string())).cloned()
    }

    fn too_large(&self, ids: &[String]) -> bool {
        ids.iter().any(|id| self.oversized.contains(id) || (ids.len() > 1 && self.bulky.contains(id)))
    }
}

impl StoreTransport for RecordingStore {
    fn get(&self, index: &str, id: &str) -> Result<Option<Source>, StoreError> {
        Ok(self.document(index, id))
    }

    fn analyze(&self, _index: &str, _analyzer: &str, text: &str) -> Result<Vec<String>, StoreError> {
        Ok(text.split_whitespace().map(str::to_lowercase).collect())
    }

    fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse, StoreError> {
        let ids: Vec<String> = operations.iter().map(|op| op.id.clone()).collect();
        let mut calls = self.calls.lock().unwrap();
        let call_no = calls.len() + 1;
        if self.fatal_on_call == Some(call_no) {
            calls.push(Call { ids, accepted: false });
            return Err(StoreError::Status { status: 503, reason: "cluster unavailable".into() });
        }
        if self.too_large(&ids) {
            calls.push(Call { ids, accepted: false });
            return Err(StoreError::entity_too_large("request entity too large"));
        }
        calls.push(Call { ids, accepted: true });
        drop(calls);

        let mut items = Vec::new();
        for op in operations {
            if self.failing.contains(&op.id) {
                items.push(BulkItemResponse::failed(&op.index, &op.id, "mapper_parsing_exception", "failed to parse field [status]"));
                continue;
            }
            let source: Source = serde_json::from_slice(&op.source).unwrap();
            self.documents.lock().unwrap().insert((op.index.clone(), op.id.clone()), source);
            items.push(BulkItemResponse::ok(&op.index, &op.id));
        }
        if self.non_positional {
            items.retain(BulkItemResponse::is_failed);
            items.reverse();
        }
        Ok(BulkResponse { items })
    }
}

pub fn message(id: &str, extra: Value) -> Message {
    let mut fields = Source::new();
    fields.insert("message".into(), json!(format!("message {id}")));
    fields.insert("timestamp".into(), json!("2024-03-01 12:00:00.000"));
    if let Value::Object(extra) = extra {
        fields.extend(extra);
    }
    Message::new(id, fields)
}

pub fn request(id: &str) -> IndexingRequest {
    IndexingRequest::new(IndexSet::new(ALIAS), message(id, Value::Null))
}

/// Requests `m1..=mn`.
pub fn requests(n: usize) -> Vec<IndexingRequest> {
    (1..=n).map(|i| request(&format!("m{i}"))).collect()
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
