// src/fs_store.rs
//
// Local filesystem backend for file:// targets
//
// Objects live at <root>/<path>/<key>; keys containing '/' become nested directories.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::constants::READ_CHUNK_SIZE;
use crate::storage::{ObjectStream, StorageClient};

/// Filesystem storage client
pub struct FileStore {
    root: PathBuf,
    chunk_size: usize,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: READ_CHUNK_SIZE,
        }
    }

    /// Override the streaming read chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve (path, key) against the root directory
    fn resolve(&self, path: &str, key: &str) -> PathBuf {
        let path = path.trim_matches('/');
        let key = key.trim_start_matches('/');
        if path.is_empty() {
            self.root.join(key)
        } else {
            self.root.join(path).join(key)
        }
    }
}

#[async_trait]
impl StorageClient for FileStore {
    async fn exists(&self, path: &str, key: &str) -> Result<bool> {
        let full = self.resolve(path, key);
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to stat {}", full.display())),
        }
    }

    async fn put(&self, path: &str, key: &str, body: Bytes) -> Result<()> {
        let full = self.resolve(path, key);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        debug!("put: {} ({} bytes)", full.display(), body.len());
        tokio::fs::write(&full, &body)
            .await
            .with_context(|| format!("Failed to write {}", full.display()))
    }

    async fn get(&self, path: &str, key: &str) -> Result<Box<dyn ObjectStream>> {
        let full = self.resolve(path, key);
        let file = tokio::fs::File::open(&full)
            .await
            .with_context(|| format!("Failed to open {}", full.display()))?;
        Ok(Box::new(FileStream {
            file: Some(file),
            chunk_size: self.chunk_size,
        }))
    }

    async fn delete(&self, path: &str, key: &str) -> Result<()> {
        let full = self.resolve(path, key);
        debug!("delete: {}", full.display());
        tokio::fs::remove_file(&full)
            .await
            .with_context(|| format!("Failed to delete {}", full.display()))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Streaming reader over an open file; the handle is released by `close` or on drop
struct FileStream {
    file: Option<tokio::fs::File>,
    chunk_size: usize,
}

#[async_trait]
impl ObjectStream for FileStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let Some(file) = self.file.as_mut() else {
            bail!("read on closed stream");
        };
        let mut buf = BytesMut::zeroed(self.chunk_size);
        let n = file.read(&mut buf[..]).await.context("Failed to read file body")?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf.freeze()))
    }

    async fn close(&mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => {
                drop(file);
                Ok(())
            }
            None => bail!("stream already closed"),
        }
    }
}
