//! Read benchmark operation
//!
//! Measures time to first byte (a readable stream handle exists) and time to
//! last byte (stream drained and closed) for GETs of pre-provisioned objects.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::Operation;
use crate::constants::MAX_PAYLOAD_SIZE;
use crate::context::BenchmarkContext;
use crate::error::{chain_message, ExecutionError, ProvisioningError};
use crate::latency::Latency;
use crate::progress::{NoopProgress, Progress};
use crate::size_parser::format_bytes;

/// State for one payload-size run of the read benchmark
///
/// `keys` only grows during provisioning (through `&mut self`), `err_keys` only
/// during execute, from any number of concurrent workers.
#[derive(Debug, Default)]
pub struct ReadOperation {
    keys: Vec<String>,
    err_keys: Mutex<HashSet<String>>,
}

impl ReadOperation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys this instance issued writes for, in provisioning order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Snapshot of keys that saw an execute-time error
    pub fn err_keys(&self) -> HashSet<String> {
        self.err_keys.lock().clone()
    }

    /// Keep `key` out of cleanup
    pub fn mark_errored(&self, key: &str) {
        self.err_keys.lock().insert(key.to_string());
    }

    /// Execute with a deadline
    ///
    /// When the deadline passes the in-flight read is dropped, which releases its
    /// stream, and the sample is recorded as errored.
    pub async fn execute_with_timeout(
        &self,
        ctx: &BenchmarkContext,
        sample_id: u64,
        payload_size: u64,
        timeout: Duration,
    ) -> Latency {
        match tokio::time::timeout(timeout, self.execute(ctx, sample_id, payload_size)).await {
            Ok(latency) => latency,
            Err(_) => {
                let key = ctx.object_key(sample_id, payload_size);
                let err = ExecutionError::Timeout {
                    key: key.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                };
                error!("{}", err);
                self.mark_errored(&key);
                Latency::errored(err)
            }
        }
    }

    async fn abort_provisioning(&self, ctx: &BenchmarkContext, err: ProvisioningError) -> ProvisioningError {
        error!("{}; removing {} provisioned objects", err, self.keys.len());
        self.cleanup_testdata(ctx, &NoopProgress).await;
        err
    }
}

#[async_trait]
impl Operation for ReadOperation {
    async fn ensure_testdata(
        &mut self,
        ctx: &BenchmarkContext,
        payload_size: u64,
        progress: &dyn Progress,
    ) -> Result<(), ProvisioningError> {
        let body_len = match usize::try_from(payload_size) {
            Ok(len) if payload_size <= MAX_PAYLOAD_SIZE => len,
            _ => {
                let err = ProvisioningError::PayloadTooLarge {
                    key: ctx.object_key(1, payload_size),
                    payload_size,
                    max: MAX_PAYLOAD_SIZE,
                };
                error!("{}", err);
                return Err(err);
            }
        };
        let mut existing = 0u64;

        for sample_id in 1..=ctx.samples {
            progress.add(1);

            let key = ctx.object_key(sample_id, payload_size);

            // Objects left by a previous run are reused as-is
            match ctx.client.exists(&ctx.path, &key).await {
                Ok(true) => {
                    debug!("Object {} already exists, skipping", key);
                    existing += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    let err = ProvisioningError::ExistenceCheck {
                        key,
                        message: chain_message(&e),
                    };
                    return Err(self.abort_provisioning(ctx, err).await);
                }
            }

            let body = Bytes::from(vec![0u8; body_len]);

            // Recorded before the outcome is known so cleanup also covers partial writes
            self.keys.push(key.clone());

            if let Err(e) = ctx.client.put(&ctx.path, &key, body).await {
                let err = ProvisioningError::Write {
                    key,
                    message: chain_message(&e),
                };
                return Err(self.abort_provisioning(ctx, err).await);
            }
        }

        info!(
            "Provisioned {} objects of {} ({} already existed)",
            self.keys.len(),
            format_bytes(payload_size),
            existing
        );
        Ok(())
    }

    async fn execute(&self, ctx: &BenchmarkContext, sample_id: u64, payload_size: u64) -> Latency {
        let key = ctx.object_key(sample_id, payload_size);

        let start = Instant::now();

        let mut stream = match ctx.client.get(&ctx.path, &key).await {
            Ok(stream) => stream,
            Err(e) => {
                let err = ExecutionError::Request {
                    key: key.clone(),
                    message: chain_message(&e),
                };
                error!("{}", err);
                self.mark_errored(&key);
                return Latency::errored(err);
            }
        };

        let mut latency = Latency {
            first_byte: Some(start.elapsed()),
            ..Default::default()
        };

        loop {
            match stream.next_chunk().await {
                Ok(Some(chunk)) => latency.bytes += chunk.len() as u64,
                Ok(None) => break,
                Err(e) => {
                    let message = chain_message(&e);
                    warn!(
                        "Error reading object body of object {} (payload: {}, sample: {}): {}",
                        key,
                        format_bytes(payload_size),
                        sample_id,
                        message
                    );
                    self.mark_errored(&key);
                    latency.errors.push(ExecutionError::Read {
                        key: key.clone(),
                        message,
                    });
                    break;
                }
            }
        }

        // Last byte is taken after close, truncated or not
        let closed = stream.close().await;
        latency.last_byte = Some(start.elapsed());
        drop(stream);

        if let Err(e) = closed {
            let err = ExecutionError::Close {
                key: key.clone(),
                message: chain_message(&e),
            };
            error!("{}", err);
            self.mark_errored(&key);
            latency.errors.push(err);
        }

        if latency.is_ok() && latency.bytes != payload_size {
            debug!(
                "Object {} returned {} bytes, expected {}",
                key, latency.bytes, payload_size
            );
        }

        latency
    }

    async fn cleanup_testdata(&self, ctx: &BenchmarkContext, progress: &dyn Progress) {
        let err_keys = self.err_keys();

        for key in &self.keys {
            progress.add(1);

            // Errored objects stay in place for post-mortem inspection
            if err_keys.contains(key) {
                debug!("Keeping errored object {}", key);
                continue;
            }

            if let Err(e) = ctx.client.delete(&ctx.path, key).await {
                debug!("Delete of {} failed: {:#}", key, e);
            }
        }
    }
}
