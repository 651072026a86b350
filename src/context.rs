//! Run context shared by the benchmark operations

use std::sync::Arc;

use crate::key::KeyGenerator;
use crate::storage::StorageClient;

/// Everything an operation needs to address the store for one run
///
/// Error- and warning-level messages go through `tracing` (`error!` / `warn!`).
#[derive(Clone)]
pub struct BenchmarkContext {
    pub client: Arc<dyn StorageClient>,
    /// Bucket or top-level directory
    pub path: String,
    /// Samples (objects) per payload size
    pub samples: u64,
    pub keys: KeyGenerator,
}

impl BenchmarkContext {
    pub fn new(
        client: Arc<dyn StorageClient>,
        path: impl Into<String>,
        samples: u64,
        keys: KeyGenerator,
    ) -> Self {
        Self {
            client,
            path: path.into(),
            samples,
            keys,
        }
    }

    pub fn object_key(&self, sample_id: u64, payload_size: u64) -> String {
        self.keys.key(sample_id, payload_size)
    }
}

impl std::fmt::Debug for BenchmarkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkContext")
            .field("client", &self.client.name())
            .field("path", &self.path)
            .field("samples", &self.samples)
            .field("keys", &self.keys)
            .finish()
    }
}
