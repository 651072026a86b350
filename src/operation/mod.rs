//! Benchmark operations
//!
//! Every operation runs in three phases per payload size:
//! - `ensure_testdata`: single-threaded provisioning of the sample objects (fail-fast)
//! - `execute`: one timed sample, called concurrently by many workers (fail-soft)
//! - `cleanup_testdata`: single-threaded removal of what provisioning created
//!
//! `ensure_testdata` takes `&mut self` and the other two `&self`, so the borrow
//! checker enforces that provisioning has finished before any execute starts.

use async_trait::async_trait;

use crate::context::BenchmarkContext;
use crate::error::ProvisioningError;
use crate::latency::Latency;
use crate::progress::Progress;

mod read;

#[cfg(test)]
mod tests;

pub use read::ReadOperation;

#[async_trait]
pub trait Operation: Send + Sync {
    /// Make sure one object per sample exists for `payload_size`
    ///
    /// On error the objects created so far have already been cleaned up.
    async fn ensure_testdata(
        &mut self,
        ctx: &BenchmarkContext,
        payload_size: u64,
        progress: &dyn Progress,
    ) -> Result<(), ProvisioningError>;

    /// Run one timed sample; errors are reported inside the returned `Latency`
    async fn execute(&self, ctx: &BenchmarkContext, sample_id: u64, payload_size: u64) -> Latency;

    /// Remove provisioned objects, keeping those that saw an error
    async fn cleanup_testdata(&self, ctx: &BenchmarkContext, progress: &dyn Progress);
}
