mod common;

use std::collections::HashSet;
use std::sync::Arc;

use docingest_bulk::{BulkExecutor, Chunk, ChunkFailure, ChunkedBulkIndexer, MessagesAdapter};
use docingest_core::error::Error;
use docingest_core::metrics::NoopMeter;
use docingest_core::types::{IndexSet, IndexingErrorKind, IndexingRequest};
use serde_json::json;

use common::{ids, message, request, requests, CountingMeter, RecordingStore, ALIAS};

fn adapter(store: RecordingStore, batch_size: Option<usize>) -> MessagesAdapter<Arc<RecordingStore>> {
    MessagesAdapter::with_meter(Arc::new(store), Arc::new(NoopMeter), ChunkedBulkIndexer::new(batch_size))
}

#[test]
fn empty_input_makes_no_store_calls() {
    let adapter = adapter(RecordingStore::new(), Some(10));
    let errors = adapter.bulk_index(&[]).expect("bulk index");
    assert!(errors.is_empty());
    assert!(adapter.store().calls().is_empty());
}

#[test]
fn mixed_batch_reports_only_the_failed_document() {
    let adapter = adapter(RecordingStore::new().failing(&["m7"]), Some(10));
    let list = requests(10);

    let errors = adapter.bulk_index(&list).expect("bulk index");

    assert_eq!(adapter.store().calls().len(), 1, "one call carries all ten requests");
    assert_eq!(adapter.store().accepted_calls()[0].len(), 10);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message_id(), "m7");
    assert_eq!(errors[0].index, ALIAS);
    assert_eq!(errors[0].kind, IndexingErrorKind::Unknown);
    assert!(errors[0].cause.contains("mapper_parsing_exception"));
    assert!(Arc::ptr_eq(&errors[0].message, list[6].message()), "error carries the original message");
    assert_eq!(adapter.store().written().len(), 9);
}

#[test]
fn groups_are_sent_in_input_order() {
    let store = RecordingStore::new();
    let list = requests(7);
    let executor = BulkExecutor::new(&store, &NoopMeter);

    let outcome = executor.execute_chunk(Chunk { requests: &list, offset: 0, size: 3 }).expect("execute");

    assert_eq!(outcome.processed, 7);
    assert_eq!(outcome.indexed(), 7);
    assert_eq!(
        store.accepted_calls(),
        vec![ids(&["m1", "m2", "m3"]), ids(&["m4", "m5", "m6"]), ids(&["m7"])]
    );
}

#[test]
fn execution_starts_at_the_offset() {
    let store = RecordingStore::new();
    let list = requests(5);
    let executor = BulkExecutor::new(&store, &NoopMeter);

    let outcome = executor.execute_chunk(Chunk { requests: &list, offset: 3, size: 10 }).expect("execute");

    assert_eq!(outcome.processed, 2);
    assert_eq!(store.accepted_calls(), vec![ids(&["m4", "m5"])]);
}

#[test]
fn too_large_group_reports_confirmed_prefix_and_earlier_errors() {
    let store = RecordingStore::new().failing(&["m2"]).oversized(&["m5"]);
    let list = requests(6);
    let executor = BulkExecutor::new(&store, &NoopMeter);

    let failure = executor.execute_chunk(Chunk { requests: &list, offset: 0, size: 2 }).unwrap_err();

    let ChunkFailure::EntityTooLarge(too_large) = failure else { panic!("expected a too-large signal") };
    assert_eq!(too_large.indexed_successfully, 4, "two groups of two were accepted");
    assert_eq!(too_large.remaining, 4..6);
    let failed: Vec<_> = too_large.failed_items.iter().map(|e| e.message_id().to_string()).collect();
    assert_eq!(failed, ids(&["m2"]), "errors of accepted groups are not lost");
    assert_eq!(store.calls().len(), 3, "nothing after the refused group is sent");
}

#[test]
fn retry_never_resubmits_confirmed_requests() {
    let adapter = adapter(RecordingStore::new().bulky(&["m6"]), Some(4));
    let list = requests(10);

    let errors = adapter.bulk_index(&list).expect("bulk index");

    assert!(errors.is_empty(), "m6 fits once it is sent alone");
    let calls: Vec<(Vec<String>, bool)> = adapter.store().calls().into_iter().map(|c| (c.ids, c.accepted)).collect();
    assert_eq!(
        calls,
        vec![
            (ids(&["m1", "m2", "m3", "m4"]), true),
            (ids(&["m5", "m6", "m7", "m8"]), false),
            (ids(&["m5", "m6"]), false),
            (ids(&["m5"]), true),
            (ids(&["m6"]), true),
            (ids(&["m7"]), true),
            (ids(&["m8"]), true),
            (ids(&["m9"]), true),
            (ids(&["m10"]), true),
        ]
    );
    let written = adapter.store().written();
    let unique: HashSet<_> = written.iter().collect();
    assert_eq!(written.len(), 10);
    assert_eq!(unique.len(), 10, "no request is written twice");
}

#[test]
fn single_oversized_document_is_reported_not_retried_forever() {
    let adapter = adapter(RecordingStore::new().oversized(&["m3"]), None);
    let list = requests(5);

    let errors = adapter.bulk_index(&list).expect("bulk index");

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message_id(), "m3");
    assert_eq!(errors[0].kind, IndexingErrorKind::EntityTooLarge);
    assert_eq!(adapter.store().written(), ids(&["m1", "m2", "m4", "m5"]));
    let attempts_with_m3 = adapter.store().calls().iter().filter(|c| c.ids.contains(&"m3".to_string())).count();
    assert_eq!(attempts_with_m3, 3, "sizes 5, 2 and 1 were tried");
}

#[test]
fn only_document_oversized() {
    let adapter = adapter(RecordingStore::new().oversized(&["m1"]), Some(8));
    let errors = adapter.bulk_index(&requests(1)).expect("bulk index");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, IndexingErrorKind::EntityTooLarge);
    assert_eq!(adapter.store().calls().len(), 1);
}

#[test]
fn transport_failure_aborts_the_invocation() {
    let adapter = adapter(RecordingStore::new().fatal_on_call(2), Some(2));
    let err = adapter.bulk_index(&requests(6)).unwrap_err();
    assert!(matches!(err, Error::Store(ref e) if e.status() == Some(503)), "got {err}");
    assert_eq!(adapter.store().calls().len(), 2, "no call after the failure");
}

#[test]
fn duplicate_ids_resolve_to_the_last_request() {
    let store = RecordingStore::new().failing(&["dup"]).non_positional();
    let list = vec![
        IndexingRequest::new(IndexSet::new("first_alias"), message("dup", json!({}))),
        IndexingRequest::new(IndexSet::new("second_alias"), message("dup", json!({}))),
        request("other"),
    ];
    let executor = BulkExecutor::new(&store, &NoopMeter);

    let outcome = executor.execute_chunk(Chunk { requests: &list, offset: 0, size: 3 }).expect("execute");

    assert_eq!(outcome.processed, 3);
    assert_eq!(outcome.errors.len(), 2, "the store reported two failed items");
    assert!(outcome.errors.iter().all(|e| e.index == "second_alias"));
}

#[test]
fn positional_responses_keep_each_occurrence() {
    let store = RecordingStore::new().failing(&["dup"]);
    let list = vec![
        IndexingRequest::new(IndexSet::new("first_alias"), message("dup", json!({}))),
        IndexingRequest::new(IndexSet::new("second_alias"), message("dup", json!({}))),
    ];
    let executor = BulkExecutor::new(&store, &NoopMeter);

    let outcome = executor.execute_chunk(Chunk { requests: &list, offset: 0, size: 2 }).expect("execute");

    let aliases: Vec<_> = outcome.errors.iter().map(|e| e.index.as_str()).collect();
    assert_eq!(aliases, vec!["first_alias", "second_alias"]);
}

#[test]
fn every_request_is_accounted_for_exactly_once() {
    for n in 0..=12usize {
        for batch_size in [None, Some(1), Some(2), Some(3), Some(5)] {
            let list = requests(n);
            let failing: Vec<String> = (1..=n).filter(|i| i % 4 == 0).map(|i| format!("m{i}")).collect();
            let bulky: Vec<String> = (1..=n).filter(|i| i % 3 == 0).map(|i| format!("m{i}")).collect();
            let oversized: Vec<String> = (1..=n).filter(|i| i % 7 == 0).map(|i| format!("m{i}")).collect();
            fn as_refs(v: &[String]) -> Vec<&str> { v.iter().map(String::as_str).collect::<Vec<_>>() }
            let store = RecordingStore::new()
                .failing(&as_refs(&failing))
                .bulky(&as_refs(&bulky))
                .oversized(&as_refs(&oversized));
            let adapter = adapter(store, batch_size);

            let errors = adapter.bulk_index(&list).expect("bulk index");

            let written = adapter.store().written();
            let failed: Vec<String> = errors.iter().map(|e| e.message_id().to_string()).collect();
            let mut all: Vec<String> = written.iter().chain(failed.iter()).cloned().collect();
            all.sort();
            let mut expected: Vec<String> = (1..=n).map(|i| format!("m{i}")).collect();
            expected.sort();
            assert_eq!(all, expected, "n={n} batch={batch_size:?}");

            let accepted: Vec<String> = adapter.store().accepted_calls().into_iter().flatten().collect();
            let unique: HashSet<_> = accepted.iter().collect();
            assert_eq!(unique.len(), accepted.len(), "n={n} batch={batch_size:?}: accepted twice");
        }
    }
}

#[test]
fn invalid_timestamps_are_counted_not_failed() {
    let meter = Arc::new(CountingMeter::default());
    let store = Arc::new(RecordingStore::new());
    let adapter = MessagesAdapter::with_meter(Arc::clone(&store), meter.clone(), ChunkedBulkIndexer::new(None));
    let list = vec![
        IndexingRequest::new(IndexSet::new(ALIAS), message("good", json!({}))),
        IndexingRequest::new(IndexSet::new(ALIAS), message("bad", json!({"timestamp": "garbage"}))),
    ];

    let errors = adapter.bulk_index(&list).expect("bulk index");

    assert!(errors.is_empty());
    assert_eq!(meter.count(), 1);
    let stored = store.document(ALIAS, "bad").expect("written");
    assert!(stored.contains_key("processing_error"));
}

#[test]
fn get_and_analyze_pass_through() {
    let adapter = adapter(RecordingStore::new(), None);
    adapter.bulk_index(&requests(1)).expect("bulk index");

    let found = adapter.get("m1", ALIAS).expect("get");
    assert_eq!(found.index, ALIAS);
    assert_eq!(found.message.id(), "m1");
    assert_eq!(found.message.get_field("message"), Some(&json!("message m1")));

    let missing = adapter.get("nope", ALIAS).unwrap_err();
    assert!(matches!(missing, Error::DocumentNotFound { ref id, .. } if id == "nope"));

    assert_eq!(adapter.analyze("Hello World", ALIAS, "standard").expect("analyze"), vec!["hello", "world"]);
}
