//! Tests for the read operation lifecycle
//!
//! All scenarios run against `MemoryStore` with injected faults.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context as LayerContext, Layer, SubscriberExt};

use super::{Operation, ReadOperation};
use crate::constants::MAX_PAYLOAD_SIZE;
use crate::context::BenchmarkContext;
use crate::error::{ExecutionError, ProvisioningError};
use crate::key::KeyGenerator;
use crate::memory_store::{FaultPlan, MemoryStore};
use crate::progress::CountingProgress;
use crate::storage::StorageClient;

const PATH: &str = "bench-bucket";
const SIZE: u64 = 1024;

fn context(store: &Arc<MemoryStore>, samples: u64) -> BenchmarkContext {
    BenchmarkContext::new(
        store.clone(),
        PATH,
        samples,
        KeyGenerator::new("test-host", "t/"),
    )
}

/// Collects (level, message) of every event emitted on the current thread
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<(Level, String)>>>);

impl CapturedLogs {
    fn at(&self, level: Level, needle: &str) -> bool {
        self.0
            .lock()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0.lock().push((*event.metadata().level(), visitor.0));
    }
}

// =========================================================================
// Provisioning
// =========================================================================

#[tokio::test]
async fn test_ensure_rejects_oversized_payload() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 3);
    let size = MAX_PAYLOAD_SIZE + 1;

    let mut op = ReadOperation::new();
    let err = op
        .ensure_testdata(&ctx, size, &CountingProgress::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProvisioningError::PayloadTooLarge { payload_size, max, .. }
            if payload_size == size && max == MAX_PAYLOAD_SIZE
    ));
    assert_eq!(err.key(), ctx.object_key(1, size));
    assert!(op.keys().is_empty());
    assert!(store.calls().is_empty(), "nothing may be written or checked");
}

#[tokio::test]
async fn test_ensure_creates_one_object_per_sample() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 3);
    let progress = CountingProgress::new();

    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &progress).await.unwrap();

    let expected: Vec<String> = (1..=3).map(|i| ctx.object_key(i, SIZE)).collect();
    assert_eq!(op.keys(), expected.as_slice());
    assert_eq!(store.puts(), expected);
    assert_eq!(progress.count(), 3);
    for key in &expected {
        assert_eq!(store.object_len(PATH, key), Some(SIZE as usize));
    }
    assert!(op.err_keys().is_empty());
}

#[tokio::test]
async fn test_ensure_skips_existing_objects() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 3);
    let existing = ctx.object_key(2, SIZE);
    store.insert(PATH, &existing, Bytes::from(vec![0u8; SIZE as usize]));

    let progress = CountingProgress::new();
    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &progress).await.unwrap();

    let expected = vec![ctx.object_key(1, SIZE), ctx.object_key(3, SIZE)];
    assert_eq!(op.keys(), expected.as_slice());
    assert_eq!(store.puts(), expected);
    assert!(!op.keys().contains(&existing));
    // Progress counts attempts, not creations
    assert_eq!(progress.count(), 3);
}

#[tokio::test]
async fn test_ensure_is_idempotent_across_runs() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 4);

    let mut first = ReadOperation::new();
    first.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();
    assert_eq!(store.puts().len(), 4);

    let mut second = ReadOperation::new();
    second.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();
    assert_eq!(store.puts().len(), 4, "second run must not write again");
    assert!(second.keys().is_empty());
}

#[tokio::test]
async fn test_write_failure_cleans_up_and_aborts() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 3);
    let key1 = ctx.object_key(1, SIZE);
    let key2 = ctx.object_key(2, SIZE);
    store.set_faults(FaultPlan::default().fail_put(key2.clone()));

    let progress = CountingProgress::new();
    let mut op = ReadOperation::new();
    let err = op.ensure_testdata(&ctx, SIZE, &progress).await.unwrap_err();

    assert!(matches!(err, ProvisioningError::Write { ref key, .. } if *key == key2));
    assert!(err.to_string().contains("QuotaExceeded"));
    // The failed write is tracked too, so cleanup covers a partial object
    assert_eq!(op.keys(), &[key1.clone(), key2.clone()]);
    // Sample 1 was removed before the error surfaced; sample 3 was never attempted
    assert!(!store.contains(PATH, &key1));
    assert_eq!(store.deletes(), vec![key1, key2]);
    assert_eq!(store.puts().len(), 2);
    // Fatal-path cleanup does not touch the caller's progress signal
    assert_eq!(progress.count(), 2);
}

#[tokio::test]
async fn test_existence_error_cleans_up_and_aborts() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 3);
    let key1 = ctx.object_key(1, SIZE);
    let key2 = ctx.object_key(2, SIZE);
    store.set_faults(FaultPlan::default().fail_exists(key2.clone()));

    let mut op = ReadOperation::new();
    let err = op
        .ensure_testdata(&ctx, SIZE, &CountingProgress::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisioningError::ExistenceCheck { .. }));
    assert_eq!(err.key(), key2);
    assert_eq!(op.keys(), &[key1.clone()]);
    assert_eq!(store.deletes(), vec![key1]);
    assert_eq!(store.object_count(), 0);
}

// =========================================================================
// Execute
// =========================================================================

#[tokio::test]
async fn test_execute_success_measures_both_latencies() {
    let store = Arc::new(MemoryStore::new().with_chunk_size(100));
    let ctx = context(&store, 3);
    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();

    for sample in 1..=3 {
        let latency = op.execute(&ctx, sample, SIZE).await;
        assert!(latency.is_ok(), "unexpected errors: {:?}", latency.errors);
        let (first, last) = latency.valid_timings().unwrap();
        assert!(last >= first);
        assert_eq!(latency.bytes, SIZE);
    }
    assert!(op.err_keys().is_empty());
    assert_eq!(store.open_streams(), 0);
}

#[tokio::test]
async fn test_execute_request_failure() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 3);
    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();

    let key2 = ctx.object_key(2, SIZE);
    store.set_faults(FaultPlan::default().fail_get(key2.clone()));

    let latency = op.execute(&ctx, 2, SIZE).await;
    assert_eq!(latency.errors.len(), 1);
    assert!(matches!(latency.errors[0], ExecutionError::Request { .. }));
    assert!(latency.first_byte.is_none());
    assert!(latency.last_byte.is_none());
    assert_eq!(latency.valid_timings(), None);
    assert!(op.err_keys().contains(&key2));
    assert_eq!(store.open_streams(), 0);
}

#[tokio::test]
async fn test_execute_read_failure_keeps_timings() {
    let store = Arc::new(MemoryStore::new().with_chunk_size(256));
    let ctx = context(&store, 1);
    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();

    let key = ctx.object_key(1, SIZE);
    store.set_faults(FaultPlan::default().fail_read(key.clone()));

    let latency = op.execute(&ctx, 1, SIZE).await;
    assert_eq!(latency.errors.len(), 1);
    assert!(matches!(latency.errors[0], ExecutionError::Read { .. }));
    assert_eq!(latency.bytes, 256, "drain stops at the first read error");
    assert!(latency.has_timings());
    assert!(latency.last_byte >= latency.first_byte);
    assert!(op.err_keys().contains(&key));
    assert_eq!(store.open_streams(), 0);
}

#[tokio::test]
async fn test_execute_close_failure_keeps_timings() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 1);
    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();

    let key = ctx.object_key(1, SIZE);
    store.set_faults(FaultPlan::default().fail_close(key.clone()));

    let latency = op.execute(&ctx, 1, SIZE).await;
    assert_eq!(latency.errors.len(), 1);
    assert!(matches!(latency.errors[0], ExecutionError::Close { .. }));
    assert_eq!(latency.bytes, SIZE);
    assert!(latency.has_timings());
    assert!(op.err_keys().contains(&key));
}

#[tokio::test]
async fn test_execute_read_and_close_failure_collects_both() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 1);
    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();

    let key = ctx.object_key(1, SIZE);
    store.set_faults(FaultPlan::default().fail_read(key.clone()).fail_close(key.clone()));

    let latency = op.execute(&ctx, 1, SIZE).await;
    assert_eq!(latency.errors.len(), 2);
    assert!(matches!(latency.errors[0], ExecutionError::Read { .. }));
    assert!(matches!(latency.errors[1], ExecutionError::Close { .. }));
}

#[tokio::test]
async fn test_execute_timeout_releases_stream() {
    let store = Arc::new(MemoryStore::new().with_chunk_size(64).with_chunk_delay(Duration::from_millis(50)));
    let ctx = context(&store, 1);
    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();

    let latency = op
        .execute_with_timeout(&ctx, 1, SIZE, Duration::from_millis(20))
        .await;
    assert!(matches!(
        latency.errors.as_slice(),
        [ExecutionError::Timeout { timeout_ms: 20, .. }]
    ));
    assert!(op.err_keys().contains(&ctx.object_key(1, SIZE)));
    assert_eq!(store.open_streams(), 0, "timed-out stream must be released");
}

#[tokio::test]
async fn test_execute_within_timeout_is_unaffected() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 1);
    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();

    let latency = op.execute_with_timeout(&ctx, 1, SIZE, Duration::from_secs(5)).await;
    assert!(latency.is_ok());
    assert!(op.err_keys().is_empty());
}

#[tokio::test]
async fn test_execute_failures_log_at_expected_levels() {
    let logs = CapturedLogs::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(logs.clone()));

    let store = Arc::new(MemoryStore::new().with_chunk_size(256));
    let ctx = context(&store, 3);
    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();

    let (get_key, read_key, close_key) = (
        ctx.object_key(1, SIZE),
        ctx.object_key(2, SIZE),
        ctx.object_key(3, SIZE),
    );
    store.set_faults(
        FaultPlan::default()
            .fail_get(get_key.clone())
            .fail_read(read_key.clone())
            .fail_close(close_key.clone()),
    );
    for sample in 1..=3 {
        op.execute(&ctx, sample, SIZE).await;
    }

    // Request and close failures go to the error sink, mid-stream failures to the warning sink
    assert!(logs.at(Level::ERROR, &format!("Failed to get object {}", get_key)));
    assert!(logs.at(Level::WARN, &format!("Error reading object body of object {}", read_key)));
    assert!(logs.at(Level::ERROR, &format!("Error closing the datastream of object {}", close_key)));
    assert!(!logs.at(Level::ERROR, &read_key));
    assert!(!logs.at(Level::WARN, &get_key));
    assert!(!logs.at(Level::WARN, &close_key));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_executes_record_all_errors() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 64);
    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();

    let mut faults = FaultPlan::default();
    for sample in (1..=64).filter(|s| s % 2 == 0) {
        faults = faults.fail_get(ctx.object_key(sample, SIZE));
    }
    store.set_faults(faults);

    let op = Arc::new(op);
    let mut handles = Vec::new();
    for sample in 1..=64u64 {
        let op = Arc::clone(&op);
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move { op.execute(&ctx, sample, SIZE).await }));
    }
    let mut failed = 0;
    for h in handles {
        if !h.await.unwrap().is_ok() {
            failed += 1;
        }
    }

    assert_eq!(failed, 32);
    let err_keys = op.err_keys();
    assert_eq!(err_keys.len(), 32);
    for sample in (1..=64).filter(|s| s % 2 == 0) {
        assert!(err_keys.contains(&ctx.object_key(sample, SIZE)));
    }
}

// =========================================================================
// Cleanup
// =========================================================================

#[tokio::test]
async fn test_cleanup_keeps_errored_objects() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 3);
    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();

    let key2 = ctx.object_key(2, SIZE);
    store.set_faults(FaultPlan::default().fail_get(key2.clone()));
    for sample in 1..=3 {
        op.execute(&ctx, sample, SIZE).await;
    }

    let progress = CountingProgress::new();
    op.cleanup_testdata(&ctx, &progress).await;

    assert_eq!(store.deletes(), vec![ctx.object_key(1, SIZE), ctx.object_key(3, SIZE)]);
    assert!(store.contains(PATH, &key2), "errored object must be left for inspection");
    // Skipped keys still count toward progress
    assert_eq!(progress.count(), 3);
}

#[tokio::test]
async fn test_cleanup_only_touches_created_keys() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 3);
    let preexisting = ctx.object_key(1, SIZE);
    store.insert(PATH, &preexisting, Bytes::from(vec![0u8; SIZE as usize]));

    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();
    let progress = CountingProgress::new();
    op.cleanup_testdata(&ctx, &progress).await;

    assert_eq!(progress.count(), 2);
    assert!(!store.deletes().contains(&preexisting));
    assert!(store.contains(PATH, &preexisting));
}

#[tokio::test]
async fn test_cleanup_ignores_delete_failures() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&store, 2);
    let mut op = ReadOperation::new();
    op.ensure_testdata(&ctx, SIZE, &CountingProgress::new()).await.unwrap();

    // Remove one object behind the operation's back so its delete fails
    let key1 = ctx.object_key(1, SIZE);
    store.delete(PATH, &key1).await.unwrap();

    let progress = CountingProgress::new();
    op.cleanup_testdata(&ctx, &progress).await;
    assert_eq!(progress.count(), 2);
    assert_eq!(store.object_count(), 0);
}
