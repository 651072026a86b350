//! Error kinds for the benchmark lifecycle
//!
//! Provisioning errors are fatal: the run for the payload size is aborted once
//! the objects created so far have been removed. Execution errors are
//! recoverable: they are carried in the sample's `Latency` and the run continues.

use thiserror::Error;

/// Fatal error raised while provisioning test objects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("Failed to check existence of object {key}: {message}")]
    ExistenceCheck { key: String, message: String },

    #[error("Failed to write object {key}: {message}")]
    Write { key: String, message: String },

    #[error("Payload size {payload_size} of object {key} exceeds the maximum of {max} bytes")]
    PayloadTooLarge { key: String, payload_size: u64, max: u64 },
}

impl ProvisioningError {
    pub fn key(&self) -> &str {
        match self {
            ProvisioningError::ExistenceCheck { key, .. }
            | ProvisioningError::Write { key, .. }
            | ProvisioningError::PayloadTooLarge { key, .. } => key,
        }
    }
}

/// Recoverable error observed while timing a single read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Failed to get object {key}: {message}")]
    Request { key: String, message: String },

    #[error("Error reading object body of object {key}: {message}")]
    Read { key: String, message: String },

    #[error("Error closing the datastream of object {key}: {message}")]
    Close { key: String, message: String },

    #[error("Read of object {key} timed out after {timeout_ms}ms")]
    Timeout { key: String, timeout_ms: u64 },
}

impl ExecutionError {
    pub fn key(&self) -> &str {
        match self {
            ExecutionError::Request { key, .. }
            | ExecutionError::Read { key, .. }
            | ExecutionError::Close { key, .. }
            | ExecutionError::Timeout { key, .. } => key,
        }
    }
}

/// Render an error with its full context chain on one line
pub(crate) fn chain_message(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}
