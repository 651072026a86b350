// src/storage.rs
//
// Storage client abstraction consumed by the benchmark operations
//
// The benchmark only needs four calls against a (path, key) pair: existence
// check, write, streaming read and delete. Backends are selected by URI scheme.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::fs_store::FileStore;
use crate::memory_store::MemoryStore;

/// Object storage operations used by the benchmark
///
/// `path` is the bucket (or top-level directory) and `key` the object name inside it.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// HEAD an object
    ///
    /// - `Ok(true)`: object exists
    /// - `Ok(false)`: object does not exist
    /// - `Err(_)`: anything else (auth, connectivity, ...)
    async fn exists(&self, path: &str, key: &str) -> Result<bool>;

    /// Write an object, replacing any previous content
    async fn put(&self, path: &str, key: &str, body: Bytes) -> Result<()>;

    /// Start a streaming read
    ///
    /// Returns once a readable stream handle exists, before any body bytes are consumed.
    async fn get(&self, path: &str, key: &str) -> Result<Box<dyn ObjectStream>>;

    /// Delete an object
    async fn delete(&self, path: &str, key: &str) -> Result<()>;

    /// Short backend name for log lines
    fn name(&self) -> &'static str;
}

/// Body of an in-flight read
///
/// Implementations must also release their resources on drop, so a stream
/// abandoned by a cancelled or timed-out read never leaks a handle.
#[async_trait]
pub trait ObjectStream: Send {
    /// Next body chunk, or `None` at end-of-stream
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;

    /// Close the stream and release its handle
    async fn close(&mut self) -> Result<()>;
}

/// Build a storage client from a target URI
///
/// Supported:
/// - `file:///abs/dir` - local filesystem rooted at the directory
/// - `mem://` - process-local in-memory store
pub fn create_store_for_uri(uri: &str) -> Result<Arc<dyn StorageClient>> {
    let url = Url::parse(uri).with_context(|| format!("Invalid target URI: {}", uri))?;
    match url.scheme() {
        "file" => {
            let root: PathBuf = url
                .to_file_path()
                .map_err(|_| anyhow::anyhow!("Target URI is not a valid local path: {}", uri))?;
            Ok(Arc::new(FileStore::new(root)))
        }
        "mem" => Ok(Arc::new(MemoryStore::new())),
        other => bail!("Unsupported target scheme '{}' (expected file:// or mem://)", other),
    }
}
