// src/memory_store.rs
//
// In-memory backend for mem:// targets and for tests
//
// Records every call in order and can inject failures per object key, which is
// how the failure paths of the benchmark lifecycle are exercised without a real
// object store.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::storage::{ObjectStream, StorageClient};

/// One recorded storage call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Exists(String),
    Put(String),
    Get(String),
    Delete(String),
}

/// Per-key failure injection
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Existence check returns an error other than not-found
    pub exists_errors: HashSet<String>,
    /// Write fails (nothing is stored)
    pub put_errors: HashSet<String>,
    /// Streaming read request fails before a stream exists
    pub get_errors: HashSet<String>,
    /// Stream yields at most one chunk, then a read error
    pub read_errors: HashSet<String>,
    /// Stream close fails
    pub close_errors: HashSet<String>,
}

impl FaultPlan {
    pub fn fail_exists(mut self, key: impl Into<String>) -> Self {
        self.exists_errors.insert(key.into());
        self
    }

    pub fn fail_put(mut self, key: impl Into<String>) -> Self {
        self.put_errors.insert(key.into());
        self
    }

    pub fn fail_get(mut self, key: impl Into<String>) -> Self {
        self.get_errors.insert(key.into());
        self
    }

    pub fn fail_read(mut self, key: impl Into<String>) -> Self {
        self.read_errors.insert(key.into());
        self
    }

    pub fn fail_close(mut self, key: impl Into<String>) -> Self {
        self.close_errors.insert(key.into());
        self
    }
}

/// In-memory storage client
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Bytes>>,
    faults: Mutex<FaultPlan>,
    calls: Mutex<Vec<StoreCall>>,
    open_streams: Arc<AtomicUsize>,
    chunk_size: usize,
    chunk_delay: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            faults: Mutex::new(FaultPlan::default()),
            calls: Mutex::new(Vec::new()),
            open_streams: Arc::new(AtomicUsize::new(0)),
            chunk_size: 64 * 1024,
            chunk_delay: Duration::ZERO,
        }
    }

    pub fn with_faults(self, faults: FaultPlan) -> Self {
        *self.faults.lock() = faults;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Delay applied before every chunk is handed out
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn set_faults(&self, faults: FaultPlan) {
        *self.faults.lock() = faults;
    }

    /// Seed an object directly, bypassing call recording
    pub fn insert(&self, path: &str, key: &str, body: Bytes) {
        self.objects.lock().insert(object_id(path, key), body);
    }

    pub fn contains(&self, path: &str, key: &str) -> bool {
        self.objects.lock().contains_key(&object_id(path, key))
    }

    pub fn object_len(&self, path: &str, key: &str) -> Option<usize> {
        self.objects.lock().get(&object_id(path, key)).map(|b| b.len())
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn puts(&self) -> Vec<String> {
        self.filter_calls(|c| match c {
            StoreCall::Put(k) => Some(k.clone()),
            _ => None,
        })
    }

    pub fn deletes(&self) -> Vec<String> {
        self.filter_calls(|c| match c {
            StoreCall::Delete(k) => Some(k.clone()),
            _ => None,
        })
    }

    pub fn gets(&self) -> Vec<String> {
        self.filter_calls(|c| match c {
            StoreCall::Get(k) => Some(k.clone()),
            _ => None,
        })
    }

    /// Streams handed out and not yet released
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    fn filter_calls<F>(&self, f: F) -> Vec<String>
    where
        F: Fn(&StoreCall) -> Option<String>,
    {
        self.calls.lock().iter().filter_map(f).collect()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().push(call);
    }
}

fn object_id(path: &str, key: &str) -> String {
    format!("{}/{}", path.trim_matches('/'), key)
}

#[async_trait]
impl StorageClient for MemoryStore {
    async fn exists(&self, path: &str, key: &str) -> Result<bool> {
        self.record(StoreCall::Exists(key.to_string()));
        if self.faults.lock().exists_errors.contains(key) {
            bail!("AccessDenied: head {}/{}", path, key);
        }
        Ok(self.contains(path, key))
    }

    async fn put(&self, path: &str, key: &str, body: Bytes) -> Result<()> {
        self.record(StoreCall::Put(key.to_string()));
        if self.faults.lock().put_errors.contains(key) {
            bail!("QuotaExceeded: put {}/{}", path, key);
        }
        self.insert(path, key, body);
        Ok(())
    }

    async fn get(&self, path: &str, key: &str) -> Result<Box<dyn ObjectStream>> {
        self.record(StoreCall::Get(key.to_string()));
        let (fail_get, fail_read, fail_close) = {
            let faults = self.faults.lock();
            (
                faults.get_errors.contains(key),
                faults.read_errors.contains(key),
                faults.close_errors.contains(key),
            )
        };
        if fail_get {
            bail!("InternalError: get {}/{}", path, key);
        }
        let body = self
            .objects
            .lock()
            .get(&object_id(path, key))
            .cloned()
            .ok_or_else(|| anyhow!("NotFound: {}/{}", path, key))?;

        let mut chunks = VecDeque::new();
        let mut offset = 0;
        while offset < body.len() {
            let end = (offset + self.chunk_size).min(body.len());
            chunks.push_back(body.slice(offset..end));
            offset = end;
        }
        if fail_read {
            chunks.truncate(1);
        }

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryStream {
            chunks,
            fail_read,
            fail_close,
            closed: false,
            delay: self.chunk_delay,
            open_streams: Arc::clone(&self.open_streams),
        }))
    }

    async fn delete(&self, path: &str, key: &str) -> Result<()> {
        self.record(StoreCall::Delete(key.to_string()));
        match self.objects.lock().remove(&object_id(path, key)) {
            Some(_) => Ok(()),
            None => bail!("NotFound: delete {}/{}", path, key),
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryStream {
    chunks: VecDeque<Bytes>,
    fail_read: bool,
    fail_close: bool,
    closed: bool,
    delay: Duration,
    open_streams: Arc<AtomicUsize>,
}

#[async_trait]
impl ObjectStream for MemoryStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.closed {
            bail!("read on closed stream");
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.chunks.pop_front() {
            Some(chunk) => Ok(Some(chunk)),
            None if self.fail_read => bail!("connection reset by peer"),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            bail!("stream already closed");
        }
        self.closed = true;
        if self.fail_close {
            bail!("broken pipe on close");
        }
        Ok(())
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        self.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}
